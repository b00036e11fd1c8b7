//! Electronic-cash note management.
//!
//! Notes are bearer value issued by one quorum client against its
//! federation balance. Each client owns one [`NoteStore`].

mod keys;
mod memory;
mod selection;
mod store;

pub use keys::NoteKeyDeriver;
pub use memory::InMemoryNoteStore;
pub use selection::split_greedy;
pub use store::{ElectronicCashNote, NoteStore};
