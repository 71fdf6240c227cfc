pub mod send_reminder;
