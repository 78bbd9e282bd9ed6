//! `wg-bridge`: stdio driver adapter for wagate.
//!
//! Every session is hosted by its own child process (typically a small
//! script wrapping a browser-automation WhatsApp client).  The gateway
//! writes one JSON command per line to the child's stdin and reads one JSON
//! event per line from its stdout:
//!
//! ```text
//! → {"type":"create","session":"company_1","autoClose":60000,"puppeteerOptions":{…}}
//! ← {"type":"qr","base64":"data:image/png;base64,…","ascii":"…"}
//! ← {"type":"status","status":"qrReadSuccess"}
//! ← {"type":"ready"}
//! → {"type":"sendText","id":1,"to":"5511987654321@c.us","text":"hi"}
//! ← {"type":"result","id":1,"ok":true}
//! ```

pub mod driver;
pub mod protocol;
pub mod transport;

pub use driver::{BridgeHandle, StdioDriver};
pub use protocol::{BridgeCommand, BridgeEvent};
