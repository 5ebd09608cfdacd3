use crate::datastructures::common::{LeapIndicator, TimeSource};

/// Properties of the distributed timescale, IEEE 1588-2019 8.2.4.
/// Updated from every accepted announce of the selected parent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimePropertiesDS {
    pub current_utc_offset: i16,
    pub current_utc_offset_valid: bool,
    pub leap_indicator: LeapIndicator,
    pub time_traceable: bool,
    pub frequency_traceable: bool,
    pub ptp_timescale: bool,
    pub time_source: TimeSource,
}

impl Default for TimePropertiesDS {
    fn default() -> Self {
        Self::new_arbitrary(false, false, TimeSource::InternalOscillator)
    }
}

impl TimePropertiesDS {
    /// Time properties for a clock on the PTP (TAI-based) timescale.
    pub fn new_ptp(
        current_utc_offset: i16,
        current_utc_offset_valid: bool,
        leap_indicator: LeapIndicator,
        time_traceable: bool,
        frequency_traceable: bool,
        time_source: TimeSource,
    ) -> Self {
        TimePropertiesDS {
            current_utc_offset,
            current_utc_offset_valid,
            leap_indicator,
            time_traceable,
            frequency_traceable,
            ptp_timescale: true,
            time_source,
        }
    }

    /// Time properties for a clock on an arbitrary timescale.
    pub fn new_arbitrary(
        time_traceable: bool,
        frequency_traceable: bool,
        time_source: TimeSource,
    ) -> Self {
        TimePropertiesDS {
            current_utc_offset: 0,
            current_utc_offset_valid: false,
            leap_indicator: LeapIndicator::NoLeap,
            time_traceable,
            frequency_traceable,
            ptp_timescale: false,
            time_source,
        }
    }

    pub fn is_leap59(&self) -> bool {
        self.leap_indicator == LeapIndicator::Leap59
    }

    pub fn is_leap61(&self) -> bool {
        self.leap_indicator == LeapIndicator::Leap61
    }
}
