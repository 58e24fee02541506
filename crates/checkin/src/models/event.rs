/// How many times one ticket may be validated
#[derive(Default, Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "schemas", derive(JsonSchema))]
#[serde(tag = "type")]
pub enum ReentryPolicy {
    /// One entry only
    #[default]
    Single,
    /// Multi-use pass
    Pass { max_uses: u32 },
    /// No limit on reentry
    Unlimited,
}

/// Golden ticket promotion
#[derive(Default, Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "schemas", derive(JsonSchema))]
pub struct GoldenTicket {
    /// Whether first validations take part in the draw
    pub enabled: bool,
    /// Winning number
    pub target: u32,
}

/// Entry-relevant event configuration
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "schemas", derive(JsonSchema))]
pub struct Event {
    /// Unique Id
    #[serde(rename = "_id")]
    pub id: String,

    /// Reentry policy
    pub reentry: ReentryPolicy,

    /// Golden ticket promotion
    #[serde(default)]
    pub golden_ticket: GoldenTicket,
}
