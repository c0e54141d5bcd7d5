use std::sync::Arc;

use indexmap::IndexMap;

use crate::geofile::feature::{Feature, FeatureCollection};

/// Group features by reference, in order of first appearance of each reference.
///
/// Within a group, all features of `primary` come before those of `secondary`, each in their
/// original order.
pub fn group_by_reference<'a>(
    primary: &'a FeatureCollection,
    secondary: &'a FeatureCollection,
) -> IndexMap<&'a str, Vec<&'a Arc<Feature>>> {
    let mut groups: IndexMap<&str, Vec<&Arc<Feature>>> = IndexMap::new();
    for feature in primary.iter().chain(secondary.iter()) {
        groups
            .entry(feature.reference_key())
            .or_default()
            .push(feature);
    }
    groups
}

/// Union of the registry and map-extract features, grouped by reference.
///
/// No feature is dropped or fused: a park present in both sources appears once per source
/// feature. Features without a reference form a single group.
pub fn merge_by_reference(
    primary: &FeatureCollection,
    secondary: &FeatureCollection,
) -> FeatureCollection {
    group_by_reference(primary, secondary)
        .into_values()
        .flatten()
        .cloned()
        .collect()
}
