use actix_web::{self, middleware::Logger, App, HttpServer};
use dotenv::dotenv;
use pollhub_backend::app::{configure_app, get_app_data};
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();
    let bind_addr = env::var("POLLS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let app_data = get_app_data().await;
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new(
                "%a \"%r\" %s %b \"%{Referer}i\" \"%{User-Agent}i\" %T",
            ))
            .configure(configure_app)
            .app_data(app_data.clone())
    })
    .bind(bind_addr)?
    .run()
    .await
}
