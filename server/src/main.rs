use std::net::SocketAddr;
use tokio::net::TcpListener;

use herbal_server::auth::jwt;
use herbal_server::config::{generate_config_template, Config};
use herbal_server::db::{
    self,
    models::{Role, UserStatus},
    users::{create_user, NewUser},
};
use herbal_server::{routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    init_tracing(config.json_logs);

    tracing::info!("Herbal Heaven notification server v{} starting", env!("CARGO_PKG_VERSION"));

    let db = db::init_db(&config.data_dir)?;

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    // Handle --create-admin: bootstrap an admin account and exit
    if let Some(email) = &config.create_admin {
        let admin = create_user(
            &db,
            NewUser {
                name: config.admin_name.clone(),
                email: email.clone(),
                role: Role::Admin,
                status: UserStatus::Active,
            },
        )?;
        let token = jwt::issue_access_token(&jwt_secret, &admin.id, Role::Admin, chrono::Duration::hours(24))?;
        tracing::info!(user_id = %admin.id, email = %admin.email, "Admin account created");
        println!("Admin user id: {}", admin.id);
        println!("Access token (valid 24h): {}", token);
        return Ok(());
    }

    let app_state = state::AppState::new(
        db,
        jwt_secret,
        config.notifications_config(),
        config.realtime_config(),
    );

    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("herbal_server=info"));

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}
