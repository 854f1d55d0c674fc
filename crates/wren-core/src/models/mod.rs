pub mod note;
pub mod preferences;
pub mod profile;
pub mod zap;

pub use note::Note;
pub use preferences::{Preferences, PreferencesStorage};
pub use profile::Profile;
pub use zap::ZapReceipt;
