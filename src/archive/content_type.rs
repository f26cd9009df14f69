/// Suffixes for which the generic table gives answers browsers do not accept for documentation
///  pages. These take precedence.
const CONTENT_TYPE_OVERRIDES: [(&str, &str); 3] = [
    (".css", "text/css"),
    (".js", "application/javascript"),
    (".svg", "image/svg+xml"),
];

pub fn content_type_for(file_name: &str) -> String {
    for (suffix, content_type) in CONTENT_TYPE_OVERRIDES {
        if file_name.ends_with(suffix) {
            return content_type.to_string();
        }
    }
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .to_string()
}
