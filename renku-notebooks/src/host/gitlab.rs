//! A blocking GitLab v4 API client.
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use url::Url;

use super::{Branch, Commit, Connect, Deletion, Error, GitHost, Project, Projects};

/// Number of items requested per page.
pub const PER_PAGE: usize = 50;

/// Header holding the next page number of a paginated response.
const NEXT_PAGE_HEADER: &str = "X-Next-Page";

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => Self::Status {
                status,
                url: response.get_url().to_owned(),
            },
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}

/// Builds [`Client`]s sharing one connection pool.
#[derive(Clone, Debug)]
pub struct Connector {
    agent: ureq::Agent,
}

impl Connector {
    pub fn new() -> Self {
        Self::with_agent(ureq::AgentBuilder::new().build())
    }

    /// Use a pre-configured agent, eg. one with timeouts or a proxy.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connect for Connector {
    type Client = Client;

    fn connect(&self, url: &Url, token: Option<&str>) -> Client {
        Client {
            agent: self.agent.clone(),
            url: url.clone(),
            token: token.map(ToOwned::to_owned),
        }
    }
}

/// GitLab client, optionally authenticated with an OAuth token.
#[derive(Clone)]
pub struct Client {
    agent: ureq::Agent,
    url: Url,
    token: Option<String>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url.as_str())
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl Client {
    /// The git host this client talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// `<url>/api/v4/<segments..>`, with every segment percent-encoded, `/` included.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v4"]).extend(segments);
        }
        url
    }

    fn project_endpoint(&self, project: &Project, segments: &[&str]) -> Url {
        let id = project.id.to_string();
        let mut path = vec!["projects", id.as_str()];
        path.extend_from_slice(segments);

        self.endpoint(&path)
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let request = self.agent.request_url(method, url);
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    /// Get a single entity, mapping `404` to `None`.
    fn get<T: DeserializeOwned>(&self, request: ureq::Request) -> Result<Option<T>, Error> {
        match request.call() {
            Ok(response) => Ok(Some(response.into_json()?)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Iterate over the pages of a listing, requesting each page only when it is reached.
    fn pages<T: DeserializeOwned>(&self, url: Url, query: &[(&str, &str)]) -> Pages<'_, T> {
        Pages {
            client: self,
            url,
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            next: Some(String::from("1")),
            item: PhantomData,
        }
    }

    /// Get every page of a listing.
    fn paginate<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        for page in self.pages(url, query) {
            items.extend(page?);
        }
        Ok(items)
    }
}

/// The pages of a listing, following [`NEXT_PAGE_HEADER`].
///
/// Iteration ends after the last page, or after the first page that fails.
struct Pages<'a, T> {
    client: &'a Client,
    url: Url,
    query: Vec<(String, String)>,
    next: Option<String>,
    item: PhantomData<T>,
}

impl<T: DeserializeOwned> Pages<'_, T> {
    fn fetch(&self, page: &str) -> Result<(Vec<T>, Option<String>), Error> {
        let response = self
            .query
            .iter()
            .fold(self.client.request("GET", &self.url), |r, (k, v)| {
                r.query(k, v)
            })
            .query("per_page", &PER_PAGE.to_string())
            .query("page", page)
            .call()?;
        let next = response
            .header(NEXT_PAGE_HEADER)
            .map(str::trim)
            .filter(|n| !n.is_empty() && *n != page)
            .map(ToOwned::to_owned);

        Ok((response.into_json()?, next))
    }
}

impl<T: DeserializeOwned> Iterator for Pages<'_, T> {
    type Item = Result<Vec<T>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.next.take()?;

        match self.fetch(&page) {
            Ok((items, next)) => {
                self.next = next;
                Some(Ok(items))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

impl GitHost for Client {
    fn project(&self, namespace_project: &str) -> Result<Option<Project>, Error> {
        let url = self.endpoint(&["projects", namespace_project]);
        self.get(self.request("GET", &url))
    }

    fn projects(&self) -> Projects<'_> {
        let pages = self.pages::<Project>(self.endpoint(&["projects"]), &[]);

        Box::new(pages.flat_map(|page| match page {
            Ok(projects) => projects.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(err) => vec![Err(err)],
        }))
    }

    fn branches(&self, project: &Project, prefix: &str) -> Result<Vec<Branch>, Error> {
        let url = self.project_endpoint(project, &["repository", "branches"]);
        let search = format!("^{prefix}");
        let branches: Vec<Branch> = self.paginate(url, &[("search", &search)])?;

        // The search is only a hint to the host; it may match more than a prefix.
        Ok(branches
            .into_iter()
            .filter(|b| b.name.starts_with(prefix))
            .collect())
    }

    fn commit(&self, project: &Project, sha: &str) -> Result<Option<Commit>, Error> {
        let url = self.project_endpoint(project, &["repository", "commits", sha]);
        self.get(self.request("GET", &url))
    }

    fn delete_branch(&self, project: &Project, name: &str) -> Result<Deletion, Error> {
        let url = self.project_endpoint(project, &["repository", "branches", name]);

        match self.request("DELETE", &url).call() {
            Ok(_) => Ok(Deletion::Deleted),
            Err(ureq::Error::Status(404, _)) => Ok(Deletion::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    fn merge_base(&self, project: &Project, a: &str, b: &str) -> Result<Commit, Error> {
        let url = self.project_endpoint(project, &["repository", "merge_base"]);
        let response = self
            .request("GET", &url)
            .query("refs[]", a)
            .query("refs[]", b)
            .call()?;

        response.into_json().map_err(Error::from)
    }
}

#[cfg(test)]
mod test {
    use std::io::{BufRead as _, BufReader, Write as _};
    use std::net::TcpListener;
    use std::sync::mpsc::{self, Receiver};
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;

    fn client(url: &str, token: Option<&str>) -> Client {
        Connector::new().connect(&Url::parse(url).unwrap(), token)
    }

    fn project() -> Project {
        Project {
            id: 42,
            path_with_namespace: "group/project".to_owned(),
        }
    }

    #[test]
    fn test_endpoint() {
        let client = client("https://gitlab.example.com", None);

        assert_eq!(
            client.endpoint(&["projects", "group/sub/project"]).as_str(),
            "https://gitlab.example.com/api/v4/projects/group%2Fsub%2Fproject"
        );
    }

    #[test]
    fn test_endpoint_with_base_path() {
        let client = client("https://example.com/gitlab/", None);

        assert_eq!(
            client.endpoint(&["projects"]).as_str(),
            "https://example.com/gitlab/api/v4/projects"
        );
    }

    #[test]
    fn test_branch_endpoint() {
        let client = client("https://gitlab.example.com", Some("tok"));
        let url = client.project_endpoint(
            &project(),
            &["repository", "branches", "renku/autosave/alice/main/abc1234/def5678"],
        );

        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/projects/42/repository/branches/\
             renku%2Fautosave%2Falice%2Fmain%2Fabc1234%2Fdef5678"
        );
    }

    #[test]
    fn test_connect() {
        let anonymous = client("https://gitlab.example.com", None);
        let registered = client("https://gitlab.example.com", Some("tok"));

        assert!(!anonymous.is_authenticated());
        assert!(registered.is_authenticated());
        assert_eq!(registered.url().as_str(), "https://gitlab.example.com/");
        assert!(!format!("{registered:?}").contains("tok"));
    }

    /// Serve one canned `(status, next page, body)` response per connection, returning
    /// the request lines received.
    fn serve(
        responses: Vec<(u16, Option<&'static str>, &'static str)>,
    ) -> (Url, Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for (status, next, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request = String::new();
                reader.read_line(&mut request).unwrap();

                let mut line = String::new();
                while reader.read_line(&mut line).unwrap() > 2 {
                    line.clear();
                }
                // Recorded before responding, so a client returning from a request has
                // always been seen.
                tx.send(request.trim().to_owned()).unwrap();

                let next = next
                    .map(|n| format!("{NEXT_PAGE_HEADER}: {n}\r\n"))
                    .unwrap_or_default();
                write!(
                    stream,
                    "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n{next}\r\n{body}",
                    body.len()
                )
                .unwrap();
            }
        });
        (url, rx)
    }

    #[test]
    fn test_projects_page_failure() {
        let (url, requests) = serve(vec![
            (200, Some("2"), r#"[{"id": 1, "path_with_namespace": "alice/p"}]"#),
            (500, None, "{}"),
        ]);
        let client = Connector::new().connect(&url, Some("tok"));
        let mut projects = client.projects();

        assert_eq!(
            projects.next().unwrap().unwrap(),
            Project {
                id: 1,
                path_with_namespace: "alice/p".to_owned()
            }
        );
        assert!(matches!(
            projects.next(),
            Some(Err(Error::Status { status: 500, .. }))
        ));
        assert!(projects.next().is_none());

        let requests = requests.iter().take(2).collect::<Vec<_>>();
        assert!(requests[0].starts_with("GET /api/v4/projects?"));
        assert!(requests[0].contains("page=1"));
        assert!(requests[1].contains("page=2"));
    }

    #[test]
    fn test_projects_are_fetched_lazily() {
        let (url, requests) = serve(vec![
            (200, Some("2"), r#"[{"id": 1, "path_with_namespace": "alice/p"}]"#),
            (200, None, r#"[{"id": 2, "path_with_namespace": "alice/q"}]"#),
        ]);
        let client = Connector::new().connect(&url, None);
        let mut projects = client.projects();

        assert!(projects.next().unwrap().is_ok());
        assert!(requests.recv().unwrap().contains("page=1"));
        assert!(requests.try_recv().is_err());

        assert_eq!(projects.next().unwrap().unwrap().id, 2);
        assert!(requests.recv().unwrap().contains("page=2"));
        assert!(projects.next().is_none());
    }

    #[test]
    fn test_branch_de() {
        let branch: Branch = serde_json::from_value(serde_json::json!({
            "name": "renku/autosave/alice/main/abc1234/def5678",
            "merged": false,
            "commit": {
                "id": "def5678e3a2c1b4d5e6f708192a3b4c5d6e7f809",
                "short_id": "def5678",
                "committed_date": "2021-03-03T11:06:44.000+01:00"
            }
        }))
        .unwrap();

        assert_eq!(branch.commit.id, "def5678e3a2c1b4d5e6f708192a3b4c5d6e7f809");
        assert_eq!(
            branch.commit.committed_date,
            Some(time::macros::datetime!(2021-03-03 11:06:44 +01:00))
        );
    }

    #[test]
    fn test_project_de() {
        let project: Project = serde_json::from_value(serde_json::json!({
            "id": 42,
            "name": "project",
            "path_with_namespace": "group/project"
        }))
        .unwrap();

        assert_eq!(project, self::project());
    }
}
