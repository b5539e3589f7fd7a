use crate::push::DisplayBroker;
use actix_web::{HttpResponse, Result, web};
use futures_util::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

#[utoipa::path(
    get,
    path = "/api/display/events",
    tag = "display",
    responses(
        (status = 200, description = "Server-sent event stream of display events")
    )
)]
pub async fn events(broker: web::Data<DisplayBroker>) -> Result<HttpResponse> {
    let stream = BroadcastStream::new(broker.subscribe()).filter_map(|event| async move {
        match event {
            Ok(event) => serde_json::to_string(&event)
                .ok()
                .map(|json| Ok::<_, actix_web::Error>(web::Bytes::from(format!("data: {json}\n\n")))),
            // A lagged subscriber just skips the events it missed.
            Err(_) => None,
        }
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

pub fn display_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/display").route("/events", web::get().to(events)));
}
