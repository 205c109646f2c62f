pub mod predict;
pub mod spell;
pub mod translit;

pub use predict::{Predictor, SystemModel, UserModel};
pub use spell::Lexicon;
pub use translit::{Scheme, Transliterator};
