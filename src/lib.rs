//! odkeyscript is a library for compiling, disassembling and deploying
//! ODKeyScript keystroke-automation programs to an ODKey macro-keyboard
//! device.
//!
//! The [`script`] module is a pure, deterministic compiler/disassembler pair
//! for ODKeyScript source. The [`transport`] module talks to a physical
//! device over Raw HID or to its HTTP/REST equivalent, behind one shared
//! [`DeviceTransport`] trait.
//!
//! # Examples
//!
//! ```
//! let bytecode = odkeyscript::script::compile("press A").unwrap();
//! assert_eq!(bytecode[0], 0x10); // KEYDN
//! ```

#![warn(missing_docs)]

pub mod script;
pub mod transport;

#[doc(inline)]
pub use script::{disassemble, Compiler, ScriptError};
#[doc(inline)]
pub use transport::{DeviceTransport, NvsValue, ProtocolError, Target, TransportError};
