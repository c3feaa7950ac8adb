use std::env;

use actix_web::web::{self, scope, Data};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    api::endpoints::*,
    auth::SECURITY_ENABLED,
    schema::api::{
        ChoiceResponse, CreatedPoll, LoginRequest, NewPoll, PollIndexResponse,
        QuestionDetailResponse, QuestionSummary, SentimentDirection, SentimentOutcome,
        SentimentSubmission, SignupRequest, TagResponse, TokenResponse, VoteOutcome,
        VoteSubmission,
    },
};

pub struct AppState {
    pub db: Pool<Postgres>,
}

pub fn configure_app(cfg: &mut web::ServiceConfig) {
    let cors = if *SECURITY_ENABLED {
        actix_cors::Cors::default()
            .allowed_headers(vec!["Authorization", "Content-Type", "Accept"])
            .allow_any_method()
            .max_age(3600)
    } else {
        actix_cors::Cors::permissive()
    };

    #[derive(OpenApi)]
    #[openapi(
        paths(
            create_poll,
            get_poll,
            get_polls,
            get_tags,
            get_version,
            login,
            logout,
            search_polls,
            sentiment,
            signup,
            vote
        ),
        components(schemas(
            ChoiceResponse,
            CreatedPoll,
            LoginRequest,
            NewPoll,
            PollIndexResponse,
            QuestionDetailResponse,
            QuestionSummary,
            SentimentDirection,
            SentimentOutcome,
            SentimentSubmission,
            SignupRequest,
            TagResponse,
            TokenResponse,
            VoteOutcome,
            VoteSubmission
        )),
        modifiers(&SecurityAddon),
        tags(
            (name = "Polls", description = "Pollhub API")
        ),
    )]
    struct ApiDoc;

    struct SecurityAddon;

    impl Modify for SecurityAddon {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            let components = openapi.components.as_mut().unwrap();
            components.add_security_scheme(
                "token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }

    let openapi = ApiDoc::openapi();

    cfg.service(SwaggerUi::new("/api/docs/{_:.*}").url("/api/openapi.json", openapi))
        .service(
            scope("/api")
                .wrap(cors)
                .service(get_polls)
                // registered before get_poll so "search" never parses as an id
                .service(search_polls)
                .service(get_poll)
                .service(create_poll)
                .service(vote)
                .service(sentiment)
                .service(get_tags)
                .service(signup)
                .service(login)
                .service(logout)
                .service(get_version),
        );
}

pub async fn get_app_data() -> Data<AppState> {
    let db = PgPoolOptions::new()
        .connect(&env::var("DATABASE_URL").expect("DATABASE_URL not set"))
        .await
        .expect("Could not connect to database");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run migrations");
    println!("Successfully connected to database! :)");
    Data::new(AppState { db })
}
