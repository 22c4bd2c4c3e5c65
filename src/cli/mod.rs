pub mod terminal;

pub use terminal::{render_resolution, ConsoleNavigator, TerminalPermissions};
