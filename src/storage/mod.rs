//!  Storage is organized through [key_value::JsonFileStorage].
//!  The basic idea is:
//!   - There is a directory holding the state.
//!   - Every logical key of the ledger is stored as its own JSON document.
//!   - [state_store] translates between those documents and the ledger state.

pub mod key_value;
pub mod state_store;
