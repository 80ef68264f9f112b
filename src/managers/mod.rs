// Shelfsync state managers
// The replica store owns the local copy of folders, bookmarks and their pending edits.

pub mod bookmark_store;
pub mod replica_store;

pub use replica_store::ReplicaStore;
