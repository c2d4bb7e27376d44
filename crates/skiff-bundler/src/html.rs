//! The pre-rendered `app.html` shell.

use minijinja::{context, Environment};

use crate::error::{BundleError, Result};

const SHELL_TEMPLATE: &str = "\
<!DOCTYPE html>
<html>
<head>
{%- for url in stylesheets %}
  <link rel=\"stylesheet\" href=\"{{ url }}\">
{%- endfor %}
{%- for url in scripts %}
  <script type=\"text/javascript\" src=\"{{ url }}\"></script>
{%- endfor %}
{{ head_extra }}</head>
<body>
{{ body_extra }}</body>
</html>
";

/// Expand the HTML shell with the bundle's script and stylesheet URLs
/// plus any head/body fragments contributed by packages.
pub(crate) fn render_shell(
    scripts: &[String],
    stylesheets: &[String],
    head_extra: &str,
    body_extra: &str,
) -> Result<String> {
    let env = Environment::new();
    env.render_str(
        SHELL_TEMPLATE,
        context! {
            scripts,
            stylesheets,
            head_extra,
            body_extra,
        },
    )
    .map_err(|e| BundleError::Template(e.to_string()))
}
