use log::{debug, info};
use rouille::{Request, Response, input::multipart};
use serde::{Deserialize, Serialize};
use std::{io::Read, sync::Arc};

use crate::{
    config::HttpConfig,
    domain::track::{Submission, SubmittedFile},
    http::error::ApiError,
    service::TrackVault,
};

const MAX_TEXT_FIELD_BYTES: u64 = 64 * 1024;

pub struct HttpServer {
    vault: Arc<TrackVault>,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(vault: TrackVault, config: HttpConfig) -> Self {
        Self {
            vault: Arc::new(vault),
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let response = rouille::router!(request,
            (GET) (/health) => {
                Response::json(&HealthResponse { status: "ok".to_string() })
            },
            (POST) (/api/mint/track) => {
                self.handle_mint(request)
            },
            (GET) (/api/user/{owner: String}/tracks) => {
                self.handle_list_tracks(&owner)
            },
            (GET) (/api/track/{id: String}/certificate) => {
                self.handle_get_certificate(&id)
            },
            (POST) (/api/track/{id: String}/certificate/publish) => {
                self.handle_publish_certificate(&id)
            },
            (GET) (/certificates/{id: String}) => {
                self.handle_certificate_document(&id)
            },
            (GET) (/verify/{id: String}) => {
                self.handle_verify(&id)
            },
            _ => ApiError::NotFound("route not found".into()).into_response()
        );

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn respond<T: Serialize>(result: Result<T, ApiError>, status: u16) -> Response {
        match result {
            Ok(body) => Response::json(&body).with_status_code(status),
            Err(e) => e.into_response(),
        }
    }

    fn handle_mint(&self, request: &Request) -> Response {
        let result = self.read_mint_form(request).and_then(|(submission, audio)| {
            Ok(self.vault.mint_track(&submission, &audio)?)
        });
        Self::respond(result, 201)
    }

    /// Reads the `title`, `artist` and `audio` parts of a mint request
    fn read_mint_form(&self, request: &Request) -> Result<(Submission, Vec<u8>), ApiError> {
        let mut form = multipart::get_multipart_input(request).map_err(|e| {
            ApiError::BadRequest(format!("expected a multipart/form-data body: {e}"))
        })?;

        let mut submission = Submission::default();
        let mut audio = Vec::new();

        while let Some(mut field) = form.next() {
            let name = field.headers.name.to_string();
            match name.as_str() {
                "title" => submission.title = Some(read_text(&mut field.data)?),
                "artist" => submission.artist = Some(read_text(&mut field.data)?),
                "audio" => {
                    let bytes = read_limited(&mut field.data, self.config.max_upload_bytes)?;
                    let original_name = field.headers.filename.clone().filter(|n| !n.is_empty());

                    // browsers send an empty part when no file was picked
                    if original_name.is_none() && bytes.is_empty() {
                        continue;
                    }
                    audio = bytes;

                    let mime_type = field
                        .headers
                        .content_type
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| {
                            original_name.as_ref().map(|n| {
                                mime_guess::from_path(n).first_or_octet_stream().to_string()
                            })
                        });

                    submission.file = Some(SubmittedFile {
                        original_name,
                        mime_type,
                        size_bytes: audio.len() as u64,
                    });
                }
                other => debug!("ignoring form field '{other}'"),
            }
        }

        Ok((submission, audio))
    }

    fn handle_list_tracks(&self, owner: &str) -> Response {
        Self::respond(
            self.vault.list_tracks(Some(owner)).map_err(ApiError::from),
            200,
        )
    }

    fn handle_get_certificate(&self, id: &str) -> Response {
        let result = self
            .vault
            .get_certificate(id)
            .map(|certificate_url| CertificateResponse { certificate_url })
            .map_err(ApiError::from);
        Self::respond(result, 200)
    }

    fn handle_publish_certificate(&self, id: &str) -> Response {
        let result = self
            .vault
            .publish_certificate(id)
            .map(|fingerprint| PublishResponse { fingerprint })
            .map_err(ApiError::from);
        Self::respond(result, 200)
    }

    fn handle_certificate_document(&self, id: &str) -> Response {
        match self.vault.certificate_document(id) {
            Ok((document, mime)) => Response::from_data(mime, document),
            Err(e) => ApiError::from(e).into_response(),
        }
    }

    fn handle_verify(&self, id: &str) -> Response {
        Self::respond(
            self.vault.verify_certificate(id).map_err(ApiError::from),
            200,
        )
    }
}

fn read_limited<R: Read>(reader: &mut R, limit: u64) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;

    if buf.len() as u64 > limit {
        return Err(ApiError::PayloadTooLarge(format!(
            "upload exceeds {limit} bytes"
        )));
    }
    Ok(buf)
}

fn read_text<R: Read>(reader: &mut R) -> Result<String, ApiError> {
    let bytes = read_limited(reader, MAX_TEXT_FIELD_BYTES)?;
    String::from_utf8(bytes)
        .map_err(|_| ApiError::BadRequest("form fields must be UTF-8".into()))
}

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateResponse {
    certificate_url: String,
}

#[derive(Serialize, Deserialize)]
struct PublishResponse {
    fingerprint: String,
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
