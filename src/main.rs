#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    quill::rocket(rocket::Config::figment()).launch().await?;
    Ok(())
}
