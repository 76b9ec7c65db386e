use tera::Tera;

use crate::error::AppError;

/// Name of the deploy banner template
pub const BANNER_TEMPLATE: &str = "banner.html";

/// Initialize the Tera template engine.
///
/// Templates are compiled into the binary so the banner renders the same
/// regardless of the working directory.
pub fn init_templates() -> Result<Tera, AppError> {
    let mut tera = Tera::default();
    tera.add_raw_template(BANNER_TEMPLATE, include_str!("../templates/banner.html"))?;
    Ok(tera)
}
