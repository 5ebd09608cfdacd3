/// Leap second indication carried by the time properties data set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LeapIndicator {
    #[default]
    NoLeap,
    /// The last minute of the current UTC day contains 61 seconds
    Leap61,
    /// The last minute of the current UTC day contains 59 seconds
    Leap59,
}
