pub mod client;
mod follows;
mod posts;
mod record;
mod sessions;
mod users;

#[cfg(test)]
mod tests;
