use crate::db::User;
use crate::pb;

impl User {
    pub fn to_pb(&self, token: String) -> pb::User {
        pb::User {
            email: self.email.clone(),
            token,
            username: self.username.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
        }
    }

    /// Public view of this user as seen by someone who does or does not
    /// follow them.
    pub fn profile(&self, following: bool) -> pb::Profile {
        pb::Profile {
            username: self.username.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
            following,
        }
    }
}

/// Partial update of a user; `None` leaves the stored value alone.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

impl From<pb::UpdateUserRequest> for UserChanges {
    fn from(req: pb::UpdateUserRequest) -> Self {
        UserChanges {
            email: req.email,
            username: req.username,
            password: req.password,
            image: req.image,
            bio: req.bio,
        }
    }
}

impl UserChanges {
    /// Copies the provided profile fields onto `user`. The password is left
    /// to the caller since it has to be hashed first.
    pub fn apply(&mut self, user: &mut User) {
        if let Some(email) = self.email.take() {
            user.email = email;
        }
        if let Some(username) = self.username.take() {
            user.username = username;
        }
        if let Some(image) = self.image.take() {
            user.image = image;
        }
        if let Some(bio) = self.bio.take() {
            user.bio = bio;
        }
    }
}
