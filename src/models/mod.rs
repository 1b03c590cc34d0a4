pub mod appointment;
pub mod billing;
pub mod clinical;
pub mod enums;
pub mod facility;
pub mod identity;
pub mod profile;
pub mod specialization;

pub use appointment::*;
pub use billing::*;
pub use clinical::*;
pub use enums::*;
pub use facility::*;
pub use identity::*;
pub use profile::*;
pub use specialization::*;
