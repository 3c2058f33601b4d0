//! Waste streams which can be left out of a calendar.

use bitmask_enum::bitmask;

use crate::record::RawFragment;

#[bitmask]
pub enum WasteStreamBitmask {
    Refuse,
    Recycling,
    Food,
    Garden,
}

impl WasteStreamBitmask {
    /// Classify a service label by keyword, the first matching stream wins.
    ///
    /// Refuse is checked first, "Non-recyclable refuse" is not recycling.
    /// Labels without a known keyword belong to no stream.
    pub fn of_label(label: &str) -> Self {
        let label = label.to_lowercase();
        [
            (&["rubbish", "refuse", "residual"][..], Self::Refuse),
            (&["recycl"][..], Self::Recycling),
            (&["food"][..], Self::Food),
            (&["garden"][..], Self::Garden),
        ]
        .into_iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| label.contains(keyword)))
        .map_or(Self::none(), |(_, stream)| stream)
    }
}

/// Drop the fragments of excluded streams.
///
/// Fragments which belong to no stream are always kept.
pub fn retain_streams(
    fragments: Vec<RawFragment>,
    excluded_streams: WasteStreamBitmask,
) -> Vec<RawFragment> {
    fragments
        .into_iter()
        .filter(|fragment| {
            // `intersects` is true for an empty mask
            let streams = WasteStreamBitmask::of_label(&fragment.label);
            streams.is_none() || !excluded_streams.intersects(streams)
        })
        .collect()
}
