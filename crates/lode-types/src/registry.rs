//! Static aspect registry.
//!
//! Maps aspect names and entity types to the closed set of record types in
//! [`crate::aspect`]. The tables are plain dispatch maps populated once at
//! startup; decoding goes through monomorphized function pointers, so there
//! is no runtime reflection anywhere in the dispatch path.

use crate::aspect::{
    Aspect, BrowsePaths, ContainerKey, CorpGroupKey, CorpUserKey, DataFlowKey, DataJobKey,
    DataPlatformKey, DatasetKey, DatasetProfile, DatasetProperties, DatasetUsageStatistics,
    DomainKey, Domains, EntityStatus, GlobalTags, GlossaryTermKey, GlossaryTerms,
    IngestionCheckpointAspect, Ownership, SchemaMetadata, SubTypes, TagKey, TelemetryClientId,
};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

/// Registry entry for one aspect kind.
#[derive(Clone, Copy)]
pub struct AspectDescriptor {
    /// Aspect name as used in request parameters and entity envelopes.
    pub name: &'static str,
    /// Fully-qualified wire schema name.
    pub record_fullname: &'static str,
    /// Whether the aspect is append-only timeseries data.
    pub timeseries: bool,
    decode_fn: fn(&Value) -> Result<AspectValue, serde_json::Error>,
}

impl AspectDescriptor {
    /// The field name the single-aspect response envelope nests the payload
    /// under (schema name with the `.avro` segment stripped).
    pub fn wire_key(&self) -> String {
        self.record_fullname.replace(".avro", "")
    }

    /// Decodes a wire JSON payload into the typed value for this kind.
    pub fn decode(&self, value: &Value) -> Result<AspectValue, serde_json::Error> {
        (self.decode_fn)(value)
    }
}

impl std::fmt::Debug for AspectDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AspectDescriptor")
            .field("name", &self.name)
            .field("record_fullname", &self.record_fullname)
            .field("timeseries", &self.timeseries)
            .finish()
    }
}

macro_rules! registry {
    ($(($variant:ident, $ty:ty)),* $(,)?) => {
        /// A decoded aspect value from the closed registry.
        #[derive(Debug, Clone, PartialEq)]
        pub enum AspectValue {
            $($variant($ty),)*
        }

        impl AspectValue {
            /// The aspect name of the contained value.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$ty>::NAME,)*
                }
            }

            /// Whether the contained value is a timeseries aspect.
            pub fn is_timeseries(&self) -> bool {
                match self {
                    $(Self::$variant(_) => <$ty>::TIMESERIES,)*
                }
            }

            /// Encodes the contained value into its wire JSON form.
            pub fn to_wire(&self) -> Result<Value, serde_json::Error> {
                match self {
                    $(Self::$variant(v) => serde_json::to_value(v),)*
                }
            }
        }

        /// All registered aspect kinds, keyed by aspect name.
        pub static ASPECTS: Lazy<HashMap<&'static str, AspectDescriptor>> = Lazy::new(|| {
            HashMap::from([
                $((
                    <$ty>::NAME,
                    AspectDescriptor {
                        name: <$ty>::NAME,
                        record_fullname: <$ty>::RECORD_FULLNAME,
                        timeseries: <$ty>::TIMESERIES,
                        decode_fn: |value| {
                            serde_json::from_value::<$ty>(value.clone()).map(AspectValue::$variant)
                        },
                    },
                ),)*
            ])
        });
    };
}

registry! {
    (Status, EntityStatus),
    (Ownership, Ownership),
    (DatasetProperties, DatasetProperties),
    (SchemaMetadata, SchemaMetadata),
    (GlobalTags, GlobalTags),
    (GlossaryTerms, GlossaryTerms),
    (Domains, Domains),
    (BrowsePaths, BrowsePaths),
    (SubTypes, SubTypes),
    (TelemetryClientId, TelemetryClientId),
    (DatasetKey, DatasetKey),
    (ContainerKey, ContainerKey),
    (CorpUserKey, CorpUserKey),
    (CorpGroupKey, CorpGroupKey),
    (TagKey, TagKey),
    (GlossaryTermKey, GlossaryTermKey),
    (DomainKey, DomainKey),
    (DataPlatformKey, DataPlatformKey),
    (DataFlowKey, DataFlowKey),
    (DataJobKey, DataJobKey),
    (DatasetUsageStatistics, DatasetUsageStatistics),
    (DatasetProfile, DatasetProfile),
    (IngestionCheckpoint, IngestionCheckpointAspect),
}

/// Key aspect per entity type. The key aspect defines an entity's identity;
/// existence checks probe for it.
pub static KEY_ASPECTS: Lazy<HashMap<&'static str, AspectDescriptor>> = Lazy::new(|| {
    fn key(name: &'static str) -> AspectDescriptor {
        // Every key registered here is also in ASPECTS.
        ASPECTS[name]
    }
    HashMap::from([
        ("dataset", key(DatasetKey::NAME)),
        ("container", key(ContainerKey::NAME)),
        ("corpuser", key(CorpUserKey::NAME)),
        ("corpGroup", key(CorpGroupKey::NAME)),
        ("tag", key(TagKey::NAME)),
        ("glossaryTerm", key(GlossaryTermKey::NAME)),
        ("domain", key(DomainKey::NAME)),
        ("dataPlatform", key(DataPlatformKey::NAME)),
        ("dataFlow", key(DataFlowKey::NAME)),
        ("dataJob", key(DataJobKey::NAME)),
    ])
});

/// Returns true when `aspect_name` is a registered timeseries aspect.
pub fn is_timeseries_aspect(aspect_name: &str) -> bool {
    ASPECTS
        .get(aspect_name)
        .map(|descriptor| descriptor.timeseries)
        .unwrap_or(false)
}
