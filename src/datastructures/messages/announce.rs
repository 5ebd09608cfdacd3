use super::Header;
use crate::{
    datastructures::{
        common::{ClockIdentity, ClockQuality, LeapIndicator, TimeSource, WireTimestamp},
        datasets::TimePropertiesDS,
        WireFormat,
    },
    error::PtpError,
};

/// The announce message body, together with the header it arrived with.
///
/// The header is kept because the best-master election compares fields of
/// both: the grandmaster vector lives in the body, the sender identity and
/// the time-property flags in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AnnounceMessage {
    pub(crate) header: Header,
    pub(crate) origin_timestamp: WireTimestamp,
    pub(crate) current_utc_offset: i16,
    pub(crate) grandmaster_priority_1: u8,
    pub(crate) grandmaster_clock_quality: ClockQuality,
    pub(crate) grandmaster_priority_2: u8,
    pub(crate) grandmaster_identity: ClockIdentity,
    pub(crate) steps_removed: u16,
    pub(crate) time_source: TimeSource,
}

impl AnnounceMessage {
    pub(crate) fn content_size(&self) -> usize {
        30
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 30 {
            return Err(PtpError::BufferTooShort);
        }

        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..12].copy_from_slice(&self.current_utc_offset.to_be_bytes());
        buffer[12] = 0;
        buffer[13] = self.grandmaster_priority_1;
        self.grandmaster_clock_quality
            .serialize(&mut buffer[14..18])?;
        buffer[18] = self.grandmaster_priority_2;
        self.grandmaster_identity.serialize(&mut buffer[19..27])?;
        buffer[27..29].copy_from_slice(&self.steps_removed.to_be_bytes());
        buffer[29] = self.time_source.to_primitive();

        Ok(())
    }

    pub(crate) fn deserialize_content(header: Header, buffer: &[u8]) -> Result<Self, PtpError> {
        if buffer.len() < 30 {
            return Err(PtpError::BufferTooShort);
        }

        let steps_removed = u16::from_be_bytes(buffer[27..29].try_into().unwrap());
        if steps_removed > 255 {
            return Err(PtpError::InvalidStepsRemoved);
        }

        Ok(Self {
            header,
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            current_utc_offset: i16::from_be_bytes(buffer[10..12].try_into().unwrap()),
            grandmaster_priority_1: buffer[13],
            grandmaster_clock_quality: ClockQuality::deserialize(&buffer[14..18])?,
            grandmaster_priority_2: buffer[18],
            grandmaster_identity: ClockIdentity::deserialize(&buffer[19..27])?,
            steps_removed,
            time_source: TimeSource::from_primitive(buffer[29]),
        })
    }

    /// The time properties this announce advertises, assembled from the
    /// header flags and the body fields.
    pub(crate) fn time_properties(&self) -> TimePropertiesDS {
        let leap_indicator = if self.header.leap59 {
            LeapIndicator::Leap59
        } else if self.header.leap61 {
            LeapIndicator::Leap61
        } else {
            LeapIndicator::NoLeap
        };

        TimePropertiesDS {
            current_utc_offset: self.current_utc_offset,
            current_utc_offset_valid: self.header.current_utc_offset_valid,
            leap_indicator,
            time_traceable: self.header.time_traceable,
            frequency_traceable: self.header.frequency_traceable,
            ptp_timescale: self.header.ptp_timescale,
            time_source: self.time_source,
        }
    }
}
