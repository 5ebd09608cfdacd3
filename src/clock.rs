//! Definitions and implementations of the abstract clock types

use crate::{
    datastructures::datasets::TimePropertiesDS,
    time::{Duration, Time},
};

/// Clock manipulation and querying interface
///
/// The clock trait is the primary way the engine interfaces with the local
/// clock (a PHC, the OS clock, or a simulation). Its implementation is
/// provided by the host; the engine never touches platform APIs.
///
/// Note that the clock implementation is responsible for handling leap
/// seconds where the platform does not.
pub trait Clock {
    /// Type of the error the methods of this [`Clock`] may return
    type Error: core::fmt::Debug;

    /// Get the current time of the clock
    fn now(&self) -> Time;

    /// Change the current time of the clock by offset. Returns the time at
    /// which the change was applied.
    fn step_clock(&mut self, offset: Duration) -> Result<Time, Self::Error>;

    /// Apply a frequency correction DELTA in parts-per-billion, returning
    /// the time at which the change was applied.
    ///
    /// The servo never emits a cumulative frequency: the adapter holds the
    /// running sum (calibration baseline plus all deltas) and programs the
    /// hardware with that total.
    fn adjust_frequency(&mut self, delta_ppb: f64) -> Result<Time, Self::Error>;

    /// Adjust the timescale properties of the clock, including the leap
    /// indicator, to the extent supported by the system.
    fn set_properties(&mut self, time_properties_ds: &TimePropertiesDS) -> Result<(), Self::Error>;
}

#[cfg(feature = "std")]
impl<T: Clock + ?Sized> Clock for std::boxed::Box<T> {
    type Error = T::Error;
    fn now(&self) -> Time {
        self.as_ref().now()
    }
    fn step_clock(&mut self, offset: Duration) -> Result<Time, Self::Error> {
        self.as_mut().step_clock(offset)
    }
    fn adjust_frequency(&mut self, delta_ppb: f64) -> Result<Time, Self::Error> {
        self.as_mut().adjust_frequency(delta_ppb)
    }
    fn set_properties(&mut self, time_properties_ds: &TimePropertiesDS) -> Result<(), Self::Error> {
        self.as_mut().set_properties(time_properties_ds)
    }
}
