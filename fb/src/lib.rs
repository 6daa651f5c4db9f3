//! fbarcset - multi-process feedback arc set search
//!
//! A supervisor process creates a small ring of solution slots in POSIX
//! shared memory, guarded by three named semaphores. Any number of generator
//! processes attach to it, sample random vertex orderings of the same
//! directed graph, and publish the back-edges of each ordering whenever that
//! set is smaller than anything they published before. The supervisor keeps
//! the global best and stops the run as soon as a generator proves the graph
//! acyclic, or when it receives SIGINT/SIGTERM.
//!
//! # Modules
//!
//! - [`graph`] - Edge parsing, the vertex universe, and vertex orderings
//! - [`solution`] - Bounded candidate solutions
//! - [`shm`] - Shared region, named semaphores, and the ring protocol
//! - [`generator`] - The randomized search loop
//! - [`supervisor`] - Resource owner and single ring reader
//! - [`signals`] - SIGINT/SIGTERM handling
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//! - [`logging`] - Tracing subscriber setup

pub mod cli;
pub mod config;
pub mod generator;
pub mod graph;
pub mod logging;
pub mod shm;
pub mod signals;
pub mod solution;
pub mod supervisor;

pub use config::Config;
pub use generator::{Generator, GeneratorStats, ShufflePolicy};
pub use graph::{Edge, EdgeParseError, Graph, VertexOrder};
pub use shm::{Phase, ResourceNames, Ring, SemError, ShmError};
pub use solution::{Candidate, MAX_SOLUTION_EDGES};
pub use supervisor::{ConsoleReporter, Outcome, Reporter, Supervisor};
