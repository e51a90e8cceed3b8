/// (De)serializes a [`std::time::Duration`] as a whole number of milliseconds.
///
/// Use with `#[serde(with = "utility::serde::duration_millis")]` and
/// `#[schemars(schema_with = "utility::serde::duration_millis::schema")]`.
pub mod duration_millis {
    use std::time::Duration;

    use schemars::gen::SchemaGenerator;
    use schemars::schema::{InstanceType, Schema, SchemaObject};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub fn schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::Integer.into()),
            format: Some("milliseconds".to_owned()),
            ..Default::default()
        }
        .into()
    }
}
