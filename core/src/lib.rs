//! # Tourbook Core
//!
//! Core traits and types shared by the tour booking marketplace crates.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state owned by a reducer (e.g. one booking record)
//! - **Action**: Every input a reducer accepts (commands from actors or the scheduler)
//! - **Event**: Facts a reducer emits after accepting an action
//! - **Reducer**: Pure function `(State, Action, Environment) → Result<Events, Error>`
//! - **Environment**: Injected dependencies (clock, policies) behind traits
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Every rule violation is an explicit error value
//! - No hidden I/O inside reducers
//! - Optimistic concurrency on persisted records ([`version::Version`])
//!
//! ## Example
//!
//! ```ignore
//! use tourbook_core::reducer::Reducer;
//!
//! impl Reducer for BookingReducer {
//!     type State = Option<Booking>;
//!     type Action = BookingAction;
//!     type Event = BookingEvent;
//!     type Error = BookingError;
//!     type Environment = BookingEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Option<Booking>,
//!         action: BookingAction,
//!         env: &BookingEnvironment,
//!     ) -> Result<SmallVec<[BookingEvent; 4]>, BookingError> {
//!         // Business logic goes here
//!         Ok(SmallVec::new())
//!     }
//! }
//! ```

pub mod store;
pub mod version;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};
pub use store::{BoxFuture, StoreError};
pub use version::Version;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Result<Events, Error>`
///
/// They contain all business rules, are deterministic given their environment, and are
/// tested without any storage or HTTP in the loop.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Event`: The facts emitted when an action is accepted
    /// - `Error`: Why an action was rejected
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Contract
    ///
    /// - On `Ok`, `state` reflects every returned event.
    /// - On `Err`, `state` is left untouched.
    /// - `Ok` with no events means the action was an accepted no-op
    ///   (for example an idempotent replay); callers skip persistence.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The event type emitted on success
        type Event;

        /// The error type returned on rejection
        type Error;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and emitted events
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is not legal for the current state.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error>;
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use tourbook_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
