//! maxbridge Core Library
//!
//! Shotgun Pipeline Toolkit engine bridge for Autodesk 3ds Max.
//!
//! # Architecture
//!
//! This library is loaded by a thin native 3ds Max plugin through FFI
//! (`ffi` module). The plugin hands over a table of host callbacks; the
//! library builds the Shotgun menu as generated MaxScript and receives menu
//! clicks back through `maxbridge_dispatch_action`.
//!
//! # Core Features Implemented
//!
//! ## Command Bridge (`registry`, `allocator`, `guard` modules)
//! - `ActionRegistry` - Maps action ids back to Rust callbacks
//! - `IdentifierAllocator` - Stable `sg_<md5>` ids, unique per menu build
//! - `ModalGuard` - Blocks menu actions while a modal dialog is open
//!
//! ## Menu Generation (`menu`, `maxscript` modules)
//! - `MenuBuilder` - Context submenu, favourites, per-app submenus
//! - `Script` / `Statement` - Escaped MaxScript code generation
//!
//! ## Engine (`engine`, `bootstrap`, `discovery` modules)
//! - `Engine` - Command registration, dispatch, version checks
//! - `bootstrap()` - Startup from `TANK_ENGINE` / `TANK_CONTEXT`
//! - `Launcher` - Finds installed 3ds Max versions and prepares launches
//!
//! ## Host Abstraction (`host` module)
//! - `HostBridge` - What the bridge needs from 3ds Max
//! - `RecordingHost` - In-memory host for dry runs and tests

pub mod allocator;
pub mod bootstrap;
pub mod command;
pub mod context;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod guard;
pub mod host;
pub mod logging;
pub mod maxscript;
pub mod menu;
pub mod registry;
pub mod settings;
pub mod version;

pub use allocator::{ActionId, IdentifierAllocator};
pub use command::{AppCommand, AppInstance, Callback, Command, CommandKind, Favourite};
pub use context::{Context, EntityRef};
pub use engine::{DispatchOutcome, Engine};
pub use error::{BridgeError, BridgeResult};
pub use guard::{ModalGuard, ModalScope};
pub use host::{Advisory, AdvisoryResponse, HostBridge, RecordingHost};
pub use maxscript::{Ident, Script, Statement};
pub use menu::{Menu, MenuBuilder, MenuKind, MenuNode, MenuTree};
pub use registry::{ActionRegistry, ActionTarget};
pub use settings::{EngineSettings, UserSettings};
pub use version::{Capability, Compatibility, MaxVersion};
