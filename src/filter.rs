use std::collections::BTreeMap;

use crate::rule::RuleField;

/// Map a positional pattern onto equality filters.
///
/// `values[i]` constrains rule position `field_index + i`. Empty values are
/// wildcards and produce no filter. Positions outside the six slots are
/// ignored, so a negative `field_index` or an overlong `values` is not an error.
pub fn build_filters<S: AsRef<str>>(
    ptype: &str,
    field_index: isize,
    values: &[S],
) -> BTreeMap<RuleField, String> {
    let mut filters = BTreeMap::new();
    filters.insert(RuleField::PType, ptype.to_string());

    for (position, slot) in RuleField::SLOTS.iter().enumerate() {
        let offset = (position as isize)
            .checked_sub(field_index)
            .and_then(|offset| usize::try_from(offset).ok());
        let Some(value) = offset.and_then(|offset| values.get(offset)) else {
            continue;
        };
        let value = value.as_ref();
        if !value.is_empty() {
            filters.insert(*slot, value.to_string());
        }
    }

    filters
}
