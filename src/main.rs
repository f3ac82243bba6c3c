mod config;
mod middleware;
mod models;
mod pipeline;
mod prompts;
mod routes;
mod storage;
mod types;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::web::{self, ServiceConfig};
use async_openai::config::OpenAIConfig;
use async_openai::Client;
use shuttle_actix_web::ShuttleActixWeb;
use shuttle_runtime::SecretStore;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use config::AppConfig;

use crate::pipeline::vision::VisionSummarizer;
use crate::storage::{ObjectStore, S3Store};

pub struct AppState {
    pub pool: PgPool,
    pub oai_client: Client<OpenAIConfig>,
    pub summarizer: Arc<VisionSummarizer>,
    pub store: Arc<dyn ObjectStore>,
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secret_store: SecretStore,
) -> ShuttleActixWeb<impl FnOnce(&mut ServiceConfig) + Send + Clone + 'static> {
    let app_config = AppConfig::new(&secret_store)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&app_config.database_url)
        .await
        .map_err(shuttle_runtime::CustomError::new)?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(shuttle_runtime::CustomError::new)?;

    let oai_client = Client::with_config(
        OpenAIConfig::new()
            .with_api_key(app_config.google_api_key.clone().unwrap_or_default())
            .with_api_base(config::OPENAI_COMPAT_API_BASE),
    );
    let summarizer = Arc::new(VisionSummarizer::new(app_config.google_api_key.clone()));
    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&app_config).await);

    let app_state = Arc::new(AppState {
        pool,
        oai_client,
        summarizer,
        store,
    });
    let app_config = Arc::new(app_config);

    let config_closure = move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(app_state.clone()));
        cfg.service(
            web::scope("")
                .wrap(middleware::auth::Authentication {
                    app_config: app_config.clone(),
                })
                .wrap(Cors::permissive())
                .service(
                    web::scope("/chats")
                        .service(routes::chat::list_chats)
                        .service(routes::chat::get_chat)
                        .service(routes::chat::update_chat)
                        .service(routes::chat::delete_chat),
                )
                .service(web::scope("/messages").service(routes::messages::send_message)),
        );
    };

    Ok(config_closure.into())
}
