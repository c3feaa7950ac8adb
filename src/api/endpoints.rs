use actix_web::{
    get, post,
    web::{self, Data, Json, Path},
    HttpRequest, HttpResponse, Responder,
};
use chrono::{DateTime, Utc};
use log::{log, Level};
use sqlx::{query, query_as, query_scalar, Pool, Postgres};

use crate::{
    api::db::{log_query, open_transaction},
    app::AppState,
    audit,
    auth::{self, User},
    polls::{self, LedgerWrite},
    schema::api::{
        ChoiceResponse, CreatedPoll, LoginRequest, NewPoll, PollIndexResponse,
        QuestionDetailResponse, QuestionSummary, SearchParams, SentimentDirection,
        SentimentOutcome, SentimentSubmission, SignupRequest, TagResponse, TokenResponse,
        VoteOutcome, VoteSubmission,
    },
    schema::db::{ChoiceTally, QuestionRow, SentimentTally, TagRow, UserRow, ID},
    utils,
};

const QUESTION_COLUMNS: &str =
    "id, question_text, pub_date, end_date, short_description, long_description, trend_score";

/// Not-found and not-eligible outcomes send the caller back to the poll
/// index instead of surfacing a hard error.
fn redirect_to_index() -> HttpResponse {
    HttpResponse::Found()
        .insert_header(("Location", "/api/polls"))
        .finish()
}

fn summarize(row: QuestionRow, now: DateTime<Utc>) -> QuestionSummary {
    QuestionSummary {
        id: row.id,
        question_text: row.question_text,
        pub_date: row.pub_date,
        end_date: row.end_date,
        short_description: row.short_description,
        trend_score: row.trend_score,
        was_published_recently: polls::was_published_recently(row.pub_date, now),
    }
}

async fn fetch_question(
    db: &Pool<Postgres>,
    id: i32,
) -> Result<Option<QuestionRow>, sqlx::Error> {
    query_as::<_, QuestionRow>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

async fn fetch_sentiment_tally(
    db: &Pool<Postgres>,
    question_id: i32,
) -> Result<SentimentTally, sqlx::Error> {
    query_as::<_, SentimentTally>(
        "SELECT COUNT(*) FILTER (WHERE vote_types) AS up_votes,
                COUNT(*) FILTER (WHERE NOT vote_types) AS down_votes
         FROM sentiment_votes WHERE question_id = $1",
    )
    .bind(question_id)
    .fetch_one(db)
    .await
}

/// A non-numeric id can never name a question, so it gets the same
/// back-to-the-index treatment as an unknown one.
fn parse_id(raw: &str) -> Result<i32, HttpResponse> {
    raw.parse().map_err(|_| {
        log!(Level::Warn, "Invalid question id {:?}", raw);
        redirect_to_index()
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    responses((status = 200, description = "Live polls plus the top trending subset", body = PollIndexResponse))
)]
#[get("/polls")]
pub async fn get_polls(state: Data<AppState>) -> impl Responder {
    let now = Utc::now();

    let all_query = format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE {} ORDER BY pub_date DESC",
        polls::LIVE_WHERE
    );
    let all_poll = match log_query(
        query_as::<_, QuestionRow>(&all_query)
            .bind(now)
            .fetch_all(&state.db)
            .await,
        None,
    )
    .await
    {
        Ok((_, rows)) => rows,
        Err(res) => return res,
    };

    let trending_query = format!(
        "SELECT {QUESTION_COLUMNS} FROM questions
         WHERE {} AND trend_score >= 100
         ORDER BY trend_score ASC LIMIT 3",
        polls::LIVE_WHERE
    );
    let trending = match log_query(
        query_as::<_, QuestionRow>(&trending_query)
            .bind(now)
            .fetch_all(&state.db)
            .await,
        None,
    )
    .await
    {
        Ok((_, rows)) => rows,
        Err(res) => return res,
    };

    HttpResponse::Ok().json(PollIndexResponse {
        all_poll: all_poll.into_iter().map(|r| summarize(r, now)).collect(),
        trending: trending.into_iter().map(|r| summarize(r, now)).collect(),
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    params(("id" = String, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question detail with derived tallies", body = QuestionDetailResponse),
        (status = 302, description = "Unknown or unpublished question; redirected to the index")
    )
)]
#[get("/polls/{id}")]
pub async fn get_poll(
    state: Data<AppState>,
    path: Path<(String,)>,
    user: Option<User>,
) -> impl Responder {
    let (id,) = path.into_inner();
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let now = Utc::now();

    let question = match log_query(fetch_question(&state.db, id).await, None).await {
        Ok((_, q)) => q,
        Err(res) => return res,
    };
    let question = match question {
        Some(q) if polls::is_published(q.pub_date, now) => q,
        _ => return redirect_to_index(),
    };

    let choices = match log_query(
        query_as::<_, ChoiceTally>(
            "SELECT c.id, c.choice_text, COUNT(v.id) AS votes
             FROM choices c
             LEFT JOIN votes v ON v.choice_id = c.id
             WHERE c.question_id = $1
             GROUP BY c.id, c.choice_text
             ORDER BY c.id",
        )
        .bind(id)
        .fetch_all(&state.db)
        .await,
        None,
    )
    .await
    {
        Ok((_, rows)) => rows,
        Err(res) => return res,
    };

    let tags = match log_query(
        query_as::<_, TagRow>(
            "SELECT t.id, t.tag_text FROM tags t
             JOIN question_tags qt ON qt.tag_id = t.id
             WHERE qt.question_id = $1
             ORDER BY t.id",
        )
        .bind(id)
        .fetch_all(&state.db)
        .await,
        None,
    )
    .await
    {
        Ok((_, rows)) => rows,
        Err(res) => return res,
    };

    let sentiment_tally = match log_query(fetch_sentiment_tally(&state.db, id).await, None).await {
        Ok((_, tally)) => tally,
        Err(res) => return res,
    };

    let participants = match log_query(
        query_scalar::<_, i64>("SELECT COUNT(*) FROM votes WHERE question_id = $1")
            .bind(id)
            .fetch_one(&state.db)
            .await,
        None,
    )
    .await
    {
        Ok((_, count)) => count,
        Err(res) => return res,
    };

    // Anonymous callers still get the poll; the "your previous vote"
    // fields are only populated for a presented bearer token.
    let (your_choice_id, your_sentiment) = match user {
        Some(user) => {
            let choice = match log_query(
                query_scalar::<_, i32>(
                    "SELECT choice_id FROM votes WHERE user_id = $1 AND question_id = $2",
                )
                .bind(user.id)
                .bind(id)
                .fetch_optional(&state.db)
                .await,
                None,
            )
            .await
            {
                Ok((_, choice)) => choice,
                Err(res) => return res,
            };

            let user_sentiment = match log_query(
                query_scalar::<_, bool>(
                    "SELECT vote_types FROM sentiment_votes WHERE user_id = $1 AND question_id = $2",
                )
                .bind(user.id)
                .bind(id)
                .fetch_optional(&state.db)
                .await,
                None,
            )
            .await
            {
                Ok((_, vote_up)) => vote_up.map(|up| {
                    if up {
                        SentimentDirection::Up
                    } else {
                        SentimentDirection::Down
                    }
                }),
                Err(res) => return res,
            };
            (choice, user_sentiment)
        }
        None => (None, None),
    };

    let (up_pct, down_pct) =
        polls::vote_percentages(sentiment_tally.up_votes, sentiment_tally.down_votes);
    HttpResponse::Ok().json(QuestionDetailResponse {
        id: question.id,
        question_text: question.question_text,
        pub_date: question.pub_date,
        end_date: question.end_date,
        short_description: question.short_description,
        long_description: question.long_description,
        trend_score: question.trend_score,
        tags: tags
            .into_iter()
            .map(|t| TagResponse {
                id: t.id,
                tag_text: t.tag_text,
            })
            .collect(),
        choices: choices
            .into_iter()
            .map(|c| ChoiceResponse {
                id: c.id,
                choice_text: c.choice_text,
                votes: c.votes,
            })
            .collect(),
        up_vote_count: sentiment_tally.up_votes,
        down_vote_count: sentiment_tally.down_votes,
        up_vote_percentage: up_pct,
        down_vote_percentage: down_pct,
        participants,
        time_left: polls::time_left(question.end_date, now),
        can_vote: polls::can_vote(question.pub_date, question.end_date, now),
        your_choice_id,
        your_sentiment,
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    params(("id" = String, Path, description = "Question id")),
    request_body = VoteSubmission,
    responses(
        (status = 201, description = "First vote recorded", body = VoteOutcome),
        (status = 200, description = "Existing vote moved to the new choice", body = VoteOutcome),
        (status = 400, description = "Missing or invalid choice selection"),
        (status = 302, description = "Question is not open for voting; redirected to the index")
    )
)]
#[post("/polls/{id}/vote", wrap = "auth::PollAuth::enabled()")]
pub async fn vote(
    state: Data<AppState>,
    path: Path<(String,)>,
    body: Json<VoteSubmission>,
    user: User,
) -> impl Responder {
    let (id,) = path.into_inner();
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let now = Utc::now();

    let question = match log_query(fetch_question(&state.db, id).await, None).await {
        Ok((_, q)) => q,
        Err(res) => return res,
    };
    let question = match question {
        Some(q) => q,
        None => return redirect_to_index(),
    };
    if !polls::can_vote(question.pub_date, question.end_date, now) {
        log!(
            Level::Warn,
            "user {} tried to vote on closed question {}",
            user.username,
            id
        );
        return redirect_to_index();
    }

    let choice_id = match body.choice_id {
        Some(choice_id) => choice_id,
        None => return HttpResponse::BadRequest().body("You didn't select a choice."),
    };
    let choice = match log_query(
        query_scalar::<_, i32>("SELECT id FROM choices WHERE id = $1 AND question_id = $2")
            .bind(choice_id)
            .bind(id)
            .fetch_optional(&state.db)
            .await,
        None,
    )
    .await
    {
        Ok((_, choice)) => choice,
        Err(res) => return res,
    };
    if choice.is_none() {
        return HttpResponse::BadRequest().body("You didn't select a choice.");
    }
    log!(
        Level::Info,
        "user {} selected choice {} on question {}",
        user.username,
        choice_id,
        id
    );

    // One row per (user, question), maintained here rather than by a unique
    // constraint: revotes move the existing row to the new choice.
    let existing = match log_query(
        query_scalar::<_, i32>("SELECT id FROM votes WHERE user_id = $1 AND question_id = $2")
            .bind(user.id)
            .bind(id)
            .fetch_optional(&state.db)
            .await,
        None,
    )
    .await
    {
        Ok((_, vote)) => vote,
        Err(res) => return res,
    };

    let write = polls::vote_write(existing);
    match existing {
        Some(vote_id) => {
            if let Err(res) = log_query(
                query("UPDATE votes SET choice_id = $1 WHERE id = $2")
                    .bind(choice_id)
                    .bind(vote_id)
                    .execute(&state.db)
                    .await,
                None,
            )
            .await
            {
                return res;
            }
        }
        None => {
            if let Err(res) = log_query(
                query("INSERT INTO votes (user_id, question_id, choice_id) VALUES ($1, $2, $3)")
                    .bind(user.id)
                    .bind(id)
                    .bind(choice_id)
                    .execute(&state.db)
                    .await,
                None,
            )
            .await
            {
                return res;
            }
        }
    }
    let outcome = match write {
        LedgerWrite::Created => "created",
        _ => "updated",
    };
    log!(
        Level::Info,
        "vote {} for user {} on question {} (choice {})",
        outcome,
        user.username,
        id,
        choice_id
    );

    let votes = match log_query(
        query_scalar::<_, i64>("SELECT COUNT(*) FROM votes WHERE choice_id = $1")
            .bind(choice_id)
            .fetch_one(&state.db)
            .await,
        None,
    )
    .await
    {
        Ok((_, count)) => count,
        Err(res) => return res,
    };

    let response = VoteOutcome {
        outcome: outcome.to_string(),
        choice_id,
        votes,
    };
    if write == LedgerWrite::Created {
        HttpResponse::Created().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    params(("id" = String, Path, description = "Question id")),
    request_body = SentimentSubmission,
    responses(
        (status = 201, description = "First sentiment recorded", body = SentimentOutcome),
        (status = 200, description = "Sentiment flipped, or unchanged on a same-direction repeat", body = SentimentOutcome),
        (status = 302, description = "Unknown question; redirected to the index")
    )
)]
#[post("/polls/{id}/sentiment", wrap = "auth::PollAuth::enabled()")]
pub async fn sentiment(
    state: Data<AppState>,
    path: Path<(String,)>,
    body: Json<SentimentSubmission>,
    user: User,
) -> impl Responder {
    let (id,) = path.into_inner();
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    // Sentiment is deliberately not gated on liveness: closed polls still
    // accept up/down votes, unlike choice voting.
    let question = match log_query(fetch_question(&state.db, id).await, None).await {
        Ok((_, q)) => q,
        Err(res) => return res,
    };
    if question.is_none() {
        return redirect_to_index();
    }

    let vote_types = body.direction.as_vote_types();
    let insert = query(
        "INSERT INTO sentiment_votes (user_id, question_id, vote_types) VALUES ($1, $2, $3)",
    )
    .bind(user.id)
    .bind(id)
    .bind(vote_types)
    .execute(&state.db)
    .await;

    let (outcome, created) = match insert {
        Ok(_) => ("created", true),
        // The unique (user, question) pair already holds a sentiment; flip
        // it on a changed mind, otherwise leave the ledger untouched.
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            let existing = match log_query(
                query_scalar::<_, bool>(
                    "SELECT vote_types FROM sentiment_votes WHERE user_id = $1 AND question_id = $2",
                )
                .bind(user.id)
                .bind(id)
                .fetch_one(&state.db)
                .await,
                None,
            )
            .await
            {
                Ok((_, existing)) => existing,
                Err(res) => return res,
            };
            match polls::sentiment_write(Some(existing), vote_types) {
                LedgerWrite::Unchanged => ("unchanged", false),
                _ => {
                    match log_query(
                        query(
                            "UPDATE sentiment_votes SET vote_types = $1
                             WHERE user_id = $2 AND question_id = $3",
                        )
                        .bind(vote_types)
                        .bind(user.id)
                        .bind(id)
                        .execute(&state.db)
                        .await,
                        None,
                    )
                    .await
                    {
                        Ok(_) => ("changed", false),
                        Err(res) => return res,
                    }
                }
            }
        }
        Err(e) => {
            log!(Level::Warn, "DB Query failed: {}", e);
            return HttpResponse::InternalServerError().body("Internal DB Error");
        }
    };
    log!(
        Level::Info,
        "sentiment {} for user {} on question {} ({:?})",
        outcome,
        user.username,
        id,
        body.direction
    );

    let tally = match log_query(fetch_sentiment_tally(&state.db, id).await, None).await {
        Ok((_, tally)) => tally,
        Err(res) => return res,
    };
    let response = SentimentOutcome {
        outcome: outcome.to_string(),
        up_vote_count: tally.up_votes,
        down_vote_count: tally.down_votes,
    };
    if created {
        HttpResponse::Created().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    params(SearchParams),
    responses((status = 200, description = "Live polls matching the query", body = [QuestionSummary]))
)]
#[get("/polls/search")]
pub async fn search_polls(
    state: Data<AppState>,
    params: web::Query<SearchParams>,
) -> impl Responder {
    let now = Utc::now();
    let q = params.q.clone().unwrap_or_default();

    let rows = if q.is_empty() {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE {} ORDER BY pub_date DESC",
            polls::LIVE_WHERE
        );
        log_query(
            query_as::<_, QuestionRow>(&sql)
                .bind(now)
                .fetch_all(&state.db)
                .await,
            None,
        )
        .await
    } else {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions
             WHERE {} AND question_text ILIKE $2
             ORDER BY id",
            polls::LIVE_WHERE
        );
        log_query(
            query_as::<_, QuestionRow>(&sql)
                .bind(now)
                .bind(utils::like_pattern(&q))
                .fetch_all(&state.db)
                .await,
            None,
        )
        .await
    };

    match rows {
        Ok((_, rows)) => HttpResponse::Ok().json(
            rows.into_iter()
                .map(|r| summarize(r, now))
                .collect::<Vec<_>>(),
        ),
        Err(res) => res,
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    request_body = NewPoll,
    responses(
        (status = 201, description = "Poll created with its choices and tags", body = CreatedPoll),
        (status = 400, description = "Validation failure")
    )
)]
#[post("/polls", wrap = "auth::PollAuth::enabled()")]
pub async fn create_poll(
    state: Data<AppState>,
    body: Json<NewPoll>,
    user: User,
) -> impl Responder {
    log!(Level::Info, "POST /api/polls");
    let now = Utc::now();

    let question_text = body.question_text.trim().to_string();
    if question_text.is_empty() {
        return HttpResponse::BadRequest().body("Question text must not be empty.");
    }
    if question_text.chars().count() > 100 {
        return HttpResponse::BadRequest().body("Question text should not exceed 100 characters.");
    }

    let pub_date = body.pub_date.unwrap_or(now);
    if let Some(end_date) = body.end_date {
        if end_date < pub_date {
            return HttpResponse::BadRequest()
                .body("End date must not be before the publish date.");
        }
    }

    let choices = utils::split_choices(&body.choices);
    if choices.iter().any(|c| c.chars().count() > 200) {
        return HttpResponse::BadRequest().body("Choice text should not exceed 200 characters.");
    }

    if !body.tag_ids.is_empty() {
        let known = match log_query(
            query_scalar::<_, i32>("SELECT id FROM tags WHERE id = ANY($1)")
                .bind(&body.tag_ids)
                .fetch_all(&state.db)
                .await,
            None,
        )
        .await
        {
            Ok((_, ids)) => ids,
            Err(res) => return res,
        };
        if body.tag_ids.iter().any(|id| !known.contains(id)) {
            return HttpResponse::BadRequest().body("Unknown tag id.");
        }
    }

    let short_description = body
        .short_description
        .clone()
        .unwrap_or_else(|| "Cool kids have polls".to_string());
    let long_description = body
        .long_description
        .clone()
        .unwrap_or_else(|| "No description provide for this poll.".to_string());

    // The one-time snapshot: no sentiment exists yet, so this is the pure
    // recency base. It is never refreshed as votes accrue.
    let trend_score = polls::trending_score(pub_date, now, 0, 0);

    let mut transaction = match open_transaction(&state.db).await {
        Ok(t) => t,
        Err(res) => return res,
    };

    let id: i32;
    match log_query(
        query_as::<_, ID>(
            "INSERT INTO questions
                 (question_text, pub_date, end_date, short_description, long_description, trend_score)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(&question_text)
        .bind(pub_date)
        .bind(body.end_date)
        .bind(&short_description)
        .bind(&long_description)
        .bind(trend_score)
        .fetch_one(&mut *transaction)
        .await,
        Some(transaction),
    )
    .await
    {
        Ok((tx, row)) => {
            transaction = tx.unwrap();
            id = row.id;
        }
        Err(res) => return res,
    }
    log!(Level::Trace, "created a new entry in questions table");

    if !choices.is_empty() {
        let ids: Vec<i32> = vec![id; choices.len()];
        match log_query(
            query(
                "INSERT INTO choices (question_id, choice_text)
                 SELECT question_id, choice_text
                 FROM UNNEST($1::int4[], $2::varchar[]) AS a(question_id, choice_text)",
            )
            .bind(&ids)
            .bind(&choices)
            .execute(&mut *transaction)
            .await,
            Some(transaction),
        )
        .await
        {
            Ok((tx, _)) => transaction = tx.unwrap(),
            Err(res) => return res,
        }
        log!(Level::Trace, "created poll choices");
    }

    if !body.tag_ids.is_empty() {
        let ids: Vec<i32> = vec![id; body.tag_ids.len()];
        match log_query(
            query(
                "INSERT INTO question_tags (question_id, tag_id)
                 SELECT question_id, tag_id
                 FROM UNNEST($1::int4[], $2::int4[]) AS a(question_id, tag_id)",
            )
            .bind(&ids)
            .bind(&body.tag_ids)
            .execute(&mut *transaction)
            .await,
            Some(transaction),
        )
        .await
        {
            Ok((tx, _)) => transaction = tx.unwrap(),
            Err(res) => return res,
        }
        log!(Level::Trace, "attached poll tags");
    }

    match transaction.commit().await {
        Ok(_) => {
            log!(
                Level::Info,
                "user {} created poll {} ({:?})",
                user.username,
                id,
                question_text
            );
            HttpResponse::Created().json(CreatedPoll { id, trend_score })
        }
        Err(e) => {
            log!(Level::Error, "Transaction failed to commit");
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    responses((status = 200, description = "All tags", body = [TagResponse]))
)]
#[get("/tags")]
pub async fn get_tags(state: Data<AppState>) -> impl Responder {
    match log_query(
        query_as::<_, TagRow>("SELECT id, tag_text FROM tags ORDER BY id")
            .fetch_all(&state.db)
            .await,
        None,
    )
    .await
    {
        Ok((_, rows)) => HttpResponse::Ok().json(
            rows.into_iter()
                .map(|t| TagResponse {
                    id: t.id,
                    tag_text: t.tag_text,
                })
                .collect::<Vec<_>>(),
        ),
        Err(res) => res,
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and logged in", body = TokenResponse),
        (status = 400, description = "Validation failure")
    )
)]
#[post("/signup")]
pub async fn signup(
    state: Data<AppState>,
    body: Json<SignupRequest>,
    req: HttpRequest,
) -> impl Responder {
    if let Err(msg) = auth::validate_signup(&body.username, &body.password, &body.password_confirm)
    {
        return HttpResponse::BadRequest().body(msg);
    }

    let password_hash = match auth::hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            log!(Level::Error, "{}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let inserted = query_as::<_, ID>(
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(&body.username)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await;

    let id = match inserted {
        Ok(row) => row.id,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return HttpResponse::BadRequest().body("This username is already in use.");
        }
        Err(e) => {
            log!(Level::Warn, "DB Query failed: {}", e);
            return HttpResponse::InternalServerError().body("Internal DB Error");
        }
    };

    let token = match auth::issue_token(id, &body.username) {
        Ok(token) => token,
        Err(e) => {
            log!(Level::Error, "Failed to issue token: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };
    audit::login_succeeded(&body.username, &audit::client_ip(&req));
    HttpResponse::Created().json(TokenResponse {
        token,
        username: body.username.clone(),
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Bad credentials")
    )
)]
#[post("/login")]
pub async fn login(
    state: Data<AppState>,
    body: Json<LoginRequest>,
    req: HttpRequest,
) -> impl Responder {
    let user = match log_query(
        query_as::<_, UserRow>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(&body.username)
        .fetch_optional(&state.db)
        .await,
        None,
    )
    .await
    {
        Ok((_, user)) => user,
        Err(res) => return res,
    };

    let user = match user {
        Some(user) if auth::verify_password(&body.password, &user.password_hash) => user,
        _ => {
            audit::login_failed(&body.username);
            return HttpResponse::Unauthorized().body("Invalid username or password.");
        }
    };

    let token = match auth::issue_token(user.id, &user.username) {
        Ok(token) => token,
        Err(e) => {
            log!(Level::Error, "Failed to issue token: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };
    audit::login_succeeded(&user.username, &audit::client_ip(&req));
    HttpResponse::Ok().json(TokenResponse {
        token,
        username: user.username,
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    responses((status = 200, description = "Logged out"))
)]
#[post("/logout", wrap = "auth::PollAuth::enabled()")]
pub async fn logout(user: User, req: HttpRequest) -> impl Responder {
    // Tokens are stateless; the audit line is the whole point here.
    audit::logout(&user.username, &audit::client_ip(&req));
    HttpResponse::Ok().finish()
}

#[utoipa::path(
    context_path = "/api",
    tag = "Polls",
    responses((status = 200, description = "Crate version"))
)]
#[get("/version")]
pub async fn get_version() -> impl Responder {
    HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn numeric_path_ids_parse() {
        assert!(matches!(parse_id("42"), Ok(42)));
    }

    #[test]
    fn non_numeric_path_ids_redirect_to_the_index() {
        let res = match parse_id("nope") {
            Ok(_) => panic!("expected a redirect"),
            Err(res) => res,
        };
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(
            res.headers().get("Location").and_then(|h| h.to_str().ok()),
            Some("/api/polls")
        );
    }

    #[test]
    fn first_vote_creates_then_revotes_update() {
        assert_eq!(polls::vote_write(None), LedgerWrite::Created);
        assert_eq!(polls::vote_write(Some(7)), LedgerWrite::Updated);
    }
}
