//http服务入口
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};

mod alerts;
mod config;
mod error;
mod handlers;
mod sheets;

use crate::config::Config;
use crate::sheets::RowSink;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 配置或凭证有问题时直接退出，不接收无法落盘的 webhook
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Config error: {}", e);
            std::process::exit(1);
        }
    };
    let sink = match cfg.build_sink() {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    log::info!(
        "Appending alerts to spreadsheet {} ({}), degenerate filter {}, body limit {} bytes",
        cfg.spreadsheet_id,
        cfg.worksheet,
        if cfg.drop_degenerate_values { "on" } else { "off" },
        cfg.max_body_bytes
    );

    let sink: Arc<dyn RowSink> = Arc::new(sink);
    let sink = web::Data::from(sink);
    let options = web::Data::new(cfg.normalize_options());
    let limit = web::Data::new(cfg.body_limit());

    let (host, port) = cfg.bind_addr();
    log::info!("Listening on {}:{}", host, port);

    // 启动 HTTP 服务
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(sink.clone())
            .app_data(options.clone())
            .app_data(limit.clone())
            .configure(handlers::configure)
    })
    .bind((host, port))? //监听地址
    .run()
    .await
}
