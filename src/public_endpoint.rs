use crate::{config::PublicEndpoint, domain::ids::TrackId};

fn base(conf: &PublicEndpoint) -> &str {
    conf.base_url.trim_end_matches('/')
}

/// returns url of the certificate snapshot, stored as the record's `certificateRef`
pub fn certificate_url(conf: &PublicEndpoint, track: &TrackId) -> String {
    format!("{}/certificates/{track}", base(conf))
}

/// returns url to be printed on certificates, checks the seal when visited
pub fn verification_url(conf: &PublicEndpoint, track: &TrackId) -> String {
    format!("{}/verify/{track}", base(conf))
}
