pub mod state;

pub use state::{ResumeRoute, SettingsError, SettingsStore, WidgetSettings};
