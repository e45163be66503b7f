mod history;
mod users;
