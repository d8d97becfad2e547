use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub message: Message<'a>,
}

#[derive(Debug, Serialize)]
pub struct Message<'a> {
    pub token: &'a str,
    pub notification: Notification<'a>,
    pub data: &'a BTreeMap<String, String>,
    pub android: AndroidConfig,
    pub webpush: WebpushConfig,
}

#[derive(Debug, Serialize)]
pub struct Notification<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AndroidConfig {
    pub priority: &'static str,
    pub notification: AndroidNotification,
}

#[derive(Debug, Serialize)]
pub struct AndroidNotification {
    pub sound: &'static str,
    pub channel_id: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WebpushConfig {
    pub notification: WebpushNotification,
}

#[derive(Debug, Serialize)]
pub struct WebpushNotification {
    pub icon: &'static str,
    pub badge: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    /// `projects/{project}/messages/{id}`
    pub name: String,
}
