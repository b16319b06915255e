// ── Channel selection ──

use softap_hal::{ApInterface, Band};
use tracing::{debug, error, warn};

use crate::model::StartFailure;

/// Used when no allowed 2.4 GHz channel is configured.
pub const DEFAULT_2G_CHANNEL: u32 = 6;

/// IEEE 802.11 channel number for a centre frequency in MHz.
pub fn frequency_to_channel(freq: u32) -> Option<u32> {
    match freq {
        2484 => Some(14),
        2412..=2472 if (freq - 2407) % 5 == 0 => Some((freq - 2407) / 5),
        5170..=5825 if freq % 5 == 0 => Some((freq - 5000) / 5),
        _ => None,
    }
}

/// Pick the operating channel. An explicit `channel` is kept as is.
///
/// 2.4 GHz takes the first allowed channel, falling back to
/// [`DEFAULT_2G_CHANNEL`]. 5 GHz takes the first channel the interface
/// reports and fails with `NoChannel` when there is none.
pub fn select_channel(
    ap: &dyn ApInterface,
    band: Band,
    channel: u32,
    allowed_2g: &[u32],
) -> Result<u32, StartFailure> {
    if channel != 0 {
        return Ok(channel);
    }
    match band {
        Band::TwoGhz => {
            let chosen = allowed_2g.first().copied().unwrap_or(DEFAULT_2G_CHANNEL);
            debug!(channel = chosen, "selected 2.4 GHz channel");
            Ok(chosen)
        }
        Band::FiveGhz => {
            let freqs = ap.channels_for_band(Band::FiveGhz).map_err(|e| {
                error!(error = %e, "cannot query 5 GHz channels");
                StartFailure::General
            })?;
            let chosen = freqs.iter().copied().find_map(frequency_to_channel);
            match chosen {
                Some(ch) => {
                    debug!(channel = ch, "selected 5 GHz channel");
                    Ok(ch)
                }
                None => {
                    warn!("no usable 5 GHz channel");
                    Err(StartFailure::NoChannel)
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use softap_hal::testing::FakeHal;

    use super::*;

    #[test]
    fn maps_common_frequencies() {
        assert_eq!(frequency_to_channel(2412), Some(1));
        assert_eq!(frequency_to_channel(2437), Some(6));
        assert_eq!(frequency_to_channel(2484), Some(14));
        assert_eq!(frequency_to_channel(5180), Some(36));
        assert_eq!(frequency_to_channel(5745), Some(149));
        assert_eq!(frequency_to_channel(5170), Some(34));
        assert_eq!(frequency_to_channel(5825), Some(165));
        assert_eq!(frequency_to_channel(60480), None);
    }

    #[test]
    fn frequencies_outside_the_5ghz_plan_are_skipped() {
        assert_eq!(frequency_to_channel(5000), None);
        assert_eq!(frequency_to_channel(5900), None);

        let hal = FakeHal::new();
        hal.set_channels(Band::FiveGhz, vec![5000, 5900, 5200]);
        let ap = hal.ap_interface();
        assert_eq!(select_channel(&*ap, Band::FiveGhz, 0, &[]), Ok(40));
    }

    #[test]
    fn explicit_channel_wins() {
        let hal = FakeHal::new();
        let ap = hal.ap_interface();
        assert_eq!(select_channel(&*ap, Band::FiveGhz, 44, &[]), Ok(44));
    }

    #[test]
    fn two_ghz_prefers_allowed_list_then_default() {
        let hal = FakeHal::new();
        let ap = hal.ap_interface();
        assert_eq!(select_channel(&*ap, Band::TwoGhz, 0, &[11, 1]), Ok(11));
        assert_eq!(select_channel(&*ap, Band::TwoGhz, 0, &[]), Ok(DEFAULT_2G_CHANNEL));
    }

    #[test]
    fn five_ghz_without_channels_is_no_channel() {
        let hal = FakeHal::new();
        hal.set_channels(Band::FiveGhz, Vec::new());
        let ap = hal.ap_interface();
        assert_eq!(
            select_channel(&*ap, Band::FiveGhz, 0, &[]),
            Err(StartFailure::NoChannel)
        );
    }

    #[test]
    fn five_ghz_takes_first_reported_channel() {
        let hal = FakeHal::new();
        let ap = hal.ap_interface();
        assert_eq!(select_channel(&*ap, Band::FiveGhz, 0, &[]), Ok(36));
    }
}
