//! redb table definitions for the load-record store.

use redb::TableDefinition;

/// Load records keyed by worker VM name, JSON-serialized.
pub const VM_LOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("vm_loads");
