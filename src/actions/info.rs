use crate::scheme::{SchemeContext, SchemeError};

pub struct InfoActionArgs {
    pub scheme: Option<String>,
}

/// Print the description and supported partition type aliases of one
/// scheme, or of every registered scheme.
pub fn invoke(ctx: &SchemeContext, args: InfoActionArgs) -> Result<(), SchemeError> {
    ctx.show_info(args.scheme.as_deref())
}
