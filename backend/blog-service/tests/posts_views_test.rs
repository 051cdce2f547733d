//! Feed contents, paging, follow feed and the index page cache

mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use blog_service::handlers::posts::CACHE_STATUS_HEADER;
use blog_service::repository::BlogRepository;
use common::{body_string, location, post_ids, TestContext};
use std::time::Duration;

const POSTS_ON_FIRST_PAGE: usize = 10;
const POSTS_ON_SECOND_PAGE: usize = 5;

#[actix_web::test]
async fn test_feeds_paginate_ten_then_five() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    let group = ctx.group("test-slug", "Тестовая группа").await;
    for i in 0..POSTS_ON_FIRST_PAGE + POSTS_ON_SECOND_PAGE {
        ctx.post(&author, &format!("Пост номер {}", i), Some(&group))
            .await;
    }
    let app = common::test_app!(ctx.state);

    for base in ["/", "/group/test-slug/", "/profile/author/"] {
        let req = test::TestRequest::get().uri(base).to_request();
        let html = body_string(test::call_service(&app, req).await).await;
        assert_eq!(post_ids(&html).len(), POSTS_ON_FIRST_PAGE, "{}", base);

        let req = test::TestRequest::get()
            .uri(&format!("{}?page=2", base))
            .to_request();
        let html = body_string(test::call_service(&app, req).await).await;
        assert_eq!(post_ids(&html).len(), POSTS_ON_SECOND_PAGE, "{}", base);
    }
}

#[actix_web::test]
async fn test_page_parameter_edge_cases() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    for i in 0..15 {
        ctx.post(&author, &format!("Пост номер {}", i), None).await;
    }
    let app = common::test_app!(ctx.state);

    let cases = [
        ("/profile/author/?page=abc", POSTS_ON_FIRST_PAGE),
        ("/profile/author/?page=999", POSTS_ON_SECOND_PAGE),
        ("/profile/author/?page=0", POSTS_ON_SECOND_PAGE),
        ("/profile/author/?page=-1", POSTS_ON_SECOND_PAGE),
    ];
    for (uri, expected) in cases {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        let html = body_string(resp).await;
        assert_eq!(post_ids(&html).len(), expected, "{}", uri);
    }
}

#[actix_web::test]
async fn test_feeds_are_newest_first_and_filtered() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    let other = ctx.user("other").await;
    let group = ctx.group("test-slug", "Тестовая группа").await;
    let other_group = ctx.group("other-slug", "Другая группа").await;

    let first = ctx.post(&author, "Первый", Some(&group)).await;
    let foreign = ctx.post(&other, "Чужой", Some(&other_group)).await;
    let second = ctx.post(&author, "Второй", None).await;
    let app = common::test_app!(ctx.state);

    let req = test::TestRequest::get().uri("/").to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert_eq!(post_ids(&html), vec![second.id, foreign.id, first.id]);

    let req = test::TestRequest::get().uri("/group/test-slug/").to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert_eq!(post_ids(&html), vec![first.id]);
    assert!(html.contains("Тестовая группа"));

    let req = test::TestRequest::get().uri("/group/other-slug/").to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(!post_ids(&html).contains(&first.id));

    let req = test::TestRequest::get().uri("/profile/author/").to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert_eq!(post_ids(&html), vec![second.id, first.id]);
    assert!(html.contains("data-posts-count>2<"));
}

#[actix_web::test]
async fn test_post_detail_shows_post_and_comments() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    let reader = ctx.user("reader").await;
    let post = ctx.post(&author, "Тестовый пост с текстом", None).await;
    ctx.repo
        .insert_comment(post.id, reader.id, "Отличный пост")
        .await
        .unwrap();
    let app = common::test_app!(ctx.state);

    let req = test::TestRequest::get()
        .uri(&format!("/posts/{}/", post.id))
        .to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(html.contains(&format!(r#"data-post-detail="{}""#, post.id)));
    assert!(html.contains("Тестовый пост с текстом"));
    assert!(html.contains("Отличный пост"));
    assert!(html.contains("data-posts-count>1<"));
    // Anonymous visitors get no comment form
    assert!(!html.contains("/comment/"));
}

#[actix_web::test]
async fn test_follow_feed_only_shows_followed_authors() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    let follower = ctx.user("follower").await;
    let stranger = ctx.user("stranger").await;
    let post = ctx.post(&author, "Пост для подписчиков", None).await;
    let app = common::test_app!(ctx.state);

    let req = test::TestRequest::get()
        .uri("/profile/author/follow/")
        .cookie(ctx.session(&follower))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(common::location(&resp), "/profile/author/");

    let req = test::TestRequest::get()
        .uri("/follow/")
        .cookie(ctx.session(&follower))
        .to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert_eq!(post_ids(&html), vec![post.id]);

    let req = test::TestRequest::get()
        .uri("/follow/")
        .cookie(ctx.session(&stranger))
        .to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(post_ids(&html).is_empty());
}

#[actix_web::test]
async fn test_follow_and_unfollow_are_idempotent() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    let follower = ctx.user("follower").await;
    let app = common::test_app!(ctx.state);

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/profile/author/follow/")
            .cookie(ctx.session(&follower))
            .to_request();
        test::call_service(&app, req).await;
    }
    assert!(ctx.repo.follow_exists(follower.id, author.id).await.unwrap());
    assert_eq!(
        ctx.repo.followed_authors(follower.id).await.unwrap().len(),
        1
    );

    // Following yourself is a no-op
    let req = test::TestRequest::get()
        .uri("/profile/author/follow/")
        .cookie(ctx.session(&author))
        .to_request();
    test::call_service(&app, req).await;
    assert!(!ctx.repo.follow_exists(author.id, author.id).await.unwrap());

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/profile/author/unfollow/")
            .cookie(ctx.session(&follower))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
    }
    assert!(!ctx.repo.follow_exists(follower.id, author.id).await.unwrap());
}

#[actix_web::test]
async fn test_profile_following_flag() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    let follower = ctx.user("follower").await;
    ctx.repo.insert_follow(follower.id, author.id).await.unwrap();
    let app = common::test_app!(ctx.state);

    let req = test::TestRequest::get().uri("/profile/author/").to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(html.contains(r#"data-following="unknown""#));

    let req = test::TestRequest::get()
        .uri("/profile/author/")
        .cookie(ctx.session(&follower))
        .to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(html.contains(r#"data-following="true""#));

    let req = test::TestRequest::get()
        .uri("/profile/follower/")
        .cookie(ctx.session(&author))
        .to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(html.contains(r#"data-following="false""#));

    // No follow button on your own profile
    let req = test::TestRequest::get()
        .uri("/profile/author/")
        .cookie(ctx.session(&author))
        .to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(!html.contains("data-following"));
}

#[actix_web::test]
async fn test_index_is_cached_until_timeout() {
    let ctx = TestContext::with_cache_timeout(1);
    let author = ctx.user("author").await;
    let first = ctx.post(&author, "Первый пост", None).await;
    let app = common::test_app!(ctx.state);

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get(CACHE_STATUS_HEADER).unwrap(), "MISS");
    let before = body_string(resp).await;
    assert_eq!(post_ids(&before), vec![first.id]);

    let second = ctx.post(&author, "Второй пост", None).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get(CACHE_STATUS_HEADER).unwrap(), "HIT");
    assert_eq!(body_string(resp).await, before);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get(CACHE_STATUS_HEADER).unwrap(), "MISS");
    let after = body_string(resp).await;
    assert_eq!(post_ids(&after), vec![second.id, first.id]);
}

#[actix_web::test]
async fn test_index_cache_is_per_viewer_and_page() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    ctx.post(&author, "Пост", None).await;
    let app = common::test_app!(ctx.state);

    let req = test::TestRequest::get().uri("/").to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/")
        .cookie(ctx.session(&author))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get(CACHE_STATUS_HEADER).unwrap(), "MISS");
    let html = body_string(resp).await;
    assert!(html.contains("data-username"));

    let req = test::TestRequest::get().uri("/?page=2").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get(CACHE_STATUS_HEADER).unwrap(), "MISS");
}

#[actix_web::test]
async fn test_repeated_page_parameter_uses_last_value() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    for i in 0..POSTS_ON_FIRST_PAGE + POSTS_ON_SECOND_PAGE {
        ctx.post(&author, &format!("Пост номер {}", i), None).await;
    }
    let app = common::test_app!(ctx.state);

    for uri in ["/?page=1&page=2", "/profile/author/?page=1&page=2"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        let html = body_string(resp).await;
        assert_eq!(post_ids(&html).len(), POSTS_ON_SECOND_PAGE, "{}", uri);
    }
}

#[actix_web::test]
async fn test_index_cache_key_uses_normalised_page() {
    let ctx = TestContext::new();
    let author = ctx.user("author").await;
    ctx.post(&author, "Пост", None).await;
    let app = common::test_app!(ctx.state);

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get(CACHE_STATUS_HEADER).unwrap(), "MISS");

    for uri in ["/?page=abc", "/?page=1", "/?page=junk&page=1"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(CACHE_STATUS_HEADER).unwrap(), "HIT", "{}", uri);
    }
}

#[actix_web::test]
async fn test_follow_redirect_encodes_username() {
    let ctx = TestContext::new();
    let author = ctx.user("лев").await;
    let follower = ctx.user("follower").await;
    let app = common::test_app!(ctx.state);

    let req = test::TestRequest::get()
        .uri("/profile/%D0%BB%D0%B5%D0%B2/follow/")
        .cookie(ctx.session(&follower))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/profile/%D0%BB%D0%B5%D0%B2/");
    assert!(ctx.repo.follow_exists(follower.id, author.id).await.unwrap());
}
