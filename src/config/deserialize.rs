// ABOUTME: Custom serde deserializers for manifest types.
// ABOUTME: Handles image refs and the non-empty unit list.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::UnitConfig;
use crate::types::ImageRef;

pub fn deserialize_image_ref_option<'de, D>(deserializer: D) -> Result<Option<ImageRef>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    opt.map(|s| ImageRef::parse(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn deserialize_units<'de, D>(deserializer: D) -> Result<NonEmpty<UnitConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let units: Vec<UnitConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(units).ok_or_else(|| serde::de::Error::custom("at least one unit is required"))
}
