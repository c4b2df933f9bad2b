use anyhow::Result;
use formsync::{
    Config, FilePart, FormSyncClient, GatewayError,
    auth::{self, AccessClaims, TokenKind},
    gateway::ApiRequest,
};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const USAGE: &str = "Usage: formsync <login|register|logout|profile|status|get|post|upload|metrics> [args]";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let config = Config::load()?;
    init_logging(&config);

    let store = auth::store_from_config(&config.auth);
    let login_url = config.auth.login_url.clone();
    let on_expired = Arc::new(move || {
        eprintln!("🔒 Session expired. Run `formsync login <email> <password>` ({})", login_url);
    });
    let client = FormSyncClient::from_config(&config, store.clone(), on_expired)?;

    match args[1].as_str() {
        "login" => {
            let (Some(email), Some(password)) = (args.get(2), args.get(3)) else {
                eprintln!("Usage: formsync login <email> <password>");
                std::process::exit(1);
            };
            match client.login(email, password).await {
                Ok(_) => println!("✅ Logged in as {}", email),
                Err(GatewayError::InvalidCredentials) => {
                    eprintln!("❌ Invalid credentials. Check your email and password.");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        "register" => {
            let (Some(name), Some(email), Some(password)) = (args.get(2), args.get(3), args.get(4))
            else {
                eprintln!("Usage: formsync register <name> <email> <password>");
                std::process::exit(1);
            };
            client.register(name, email, password).await?;
            println!("✅ Registered {}. You can now log in.", email);
        }

        "logout" => {
            client.logout().await;
            println!("✅ Logged out, credentials cleared");
        }

        "profile" => {
            let profile = client.profile().await?;
            println!("👤 {} <{}>", profile.display_name(), profile.email);
            println!("   Role: {:?}", profile.role);
            if profile.role.can_manage_templates() {
                println!("   Can manage form templates");
            }
        }

        "status" => {
            println!("\n🔐 Authentication Status");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
            println!("API: {}", config.api.base_url);

            match store.get(TokenKind::Access).await? {
                Some(token) => match AccessClaims::decode(&token).and_then(|c| c.expires_at()) {
                    Some(expires) => {
                        let now = chrono::Utc::now();
                        if expires > now {
                            let remaining = expires - now;
                            println!(
                                "✅ Access token: valid ({} minutes remaining)",
                                remaining.num_minutes()
                            );
                        } else {
                            println!("⚠️  Access token: expired (will auto-refresh)");
                        }
                    }
                    None => println!("✅ Access token: present"),
                },
                None => println!("❌ Access token: not authenticated"),
            }

            match store.get(TokenKind::Refresh).await? {
                Some(_) => println!("✅ Refresh token: present"),
                None => println!("❌ Refresh token: missing"),
            }
            println!();
        }

        "get" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: formsync get <path>");
                std::process::exit(1);
            };
            let body: serde_json::Value = client.gateway().get_json(path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        "post" => {
            let (Some(path), Some(raw)) = (args.get(2), args.get(3)) else {
                eprintln!("Usage: formsync post <path> <json>");
                std::process::exit(1);
            };
            let payload: serde_json::Value = serde_json::from_str(raw)?;
            let request = ApiRequest::post(path.as_str()).json(&payload)?;
            let body: serde_json::Value = client.gateway().send_json(request).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        "upload" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: formsync upload <file> [mime-type]");
                std::process::exit(1);
            };
            let data = tokio::fs::read(path).await?;
            let filename = std::path::Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());

            let mut part = FilePart::new("file", filename, data);
            if let Some(mime) = args.get(3) {
                part = part.mime(mime.as_str());
            }
            let stored = client.upload_file(part).await?;
            println!("✅ Uploaded");
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }

        "metrics" => {
            print!("{}", formsync::metrics::render()?);
        }

        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}
