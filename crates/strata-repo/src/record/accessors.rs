//! Property accessor overrides.
//!
//! A record type may intercept reads and writes of individual properties
//! by attaching an implementation of this trait to its schema. Dispatch
//! is capability-checked: the override is consulted first, and a `None`
//! return falls through to the generic get/set path.

use strata_common::{StrataResult, Value};

use super::entity::Record;

/// Interception points for property access.
///
/// Override bodies should use [`Record::get_property`] and
/// [`Record::set_property`], the generic paths, to touch the record's
/// own state, so they do not recurse into themselves.
pub trait PropertyAccessors: Send + Sync {
    /// Intercepts a property write. Return `None` to fall through to the
    /// generic set path for this property.
    fn set(&self, record: &mut Record, property: &str, value: Value) -> Option<StrataResult<()>> {
        let _ = (record, property, value);
        None
    }

    /// Intercepts a property read. Return `None` to fall through to the
    /// generic get path for this property.
    fn get(&self, record: &Record, property: &str) -> Option<Value> {
        let _ = (record, property);
        None
    }
}
