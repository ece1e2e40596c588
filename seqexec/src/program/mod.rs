mod serde;
mod types;

pub use self::serde::{ProgramDeserialize, ProgramSerialize};
pub use types::{
    AttrValue, BlockDesc, OpDesc, ProgramDesc, VarDesc, VarType, EMPTY_VAR_NAME, FEED_OP_TYPE,
    FETCH_OP_TYPE,
};
