mod identity;
mod party_update;
mod player_state;
mod track_id;

pub use identity::*;
pub use party_update::*;
pub use player_state::*;
pub use track_id::*;
