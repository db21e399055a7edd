pub mod autoscaler;
pub mod namespace_cleanup;
pub mod pdb_autoscaler;
pub mod target_pdb;
