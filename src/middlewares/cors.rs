use actix_cors::Cors;

pub fn create_cors() -> Cors {
    Cors::default()
        .allowed_origin_fn(|_, _req_head| {
            // Restrict to the practice's domains in production deployments.
            true
        })
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        // The referrer cookie on the signup flow needs credentials.
        .supports_credentials()
        .max_age(3600)
}
