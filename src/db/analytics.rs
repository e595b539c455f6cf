/// View and click event vocabularies
use crate::db::text_enum;

text_enum! {
    /// How the visitor reached the tool
    TrafficSource, "traffic source" {
        Direct => "direct",
        Search => "search",
        Referral => "referral",
        Marketplace => "marketplace",
    }
}

text_enum! {
    ClickType, "click type" {
        Website => "website",
        AppStore => "app_store",
        GooglePlay => "google_play",
    }
}

impl Default for TrafficSource {
    fn default() -> Self {
        TrafficSource::Marketplace
    }
}

impl Default for ClickType {
    fn default() -> Self {
        ClickType::Website
    }
}

/// Every traffic source, in reporting order
pub const TRAFFIC_SOURCES: [TrafficSource; 4] = [
    TrafficSource::Direct,
    TrafficSource::Search,
    TrafficSource::Referral,
    TrafficSource::Marketplace,
];

pub const CLICK_TYPES: [ClickType; 3] = [
    ClickType::Website,
    ClickType::AppStore,
    ClickType::GooglePlay,
];
