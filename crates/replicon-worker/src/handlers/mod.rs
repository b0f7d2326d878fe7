pub mod cancel;
pub mod fill;
pub mod modify;
pub mod new;

pub use cancel::handle_cancel;
pub use fill::handle_fill;
pub use modify::handle_modify;
pub use new::handle_new;
