//! Adapters: host-side implementations the binary plugs in.
//!
//! | Adapter   | Implements | Connects to                  |
//! |-----------|------------|------------------------------|
//! | `console` | `log::Log` | stderr (the shared console)  |

pub mod console;
